//! The typed field layer of the codec.
//!
//! Every packet field is a [Convertable]: it knows how to read itself from a
//! cursor over the datagram and how to append its wire form to an outgoing
//! buffer. Length fields derive their value from a sibling payload through
//! the packet-typed context parameter.

use crate::{Error, Result};
use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read};
use std::net::Ipv4Addr;

/// A value that can be read from and written to an Art-Net packet body.
///
/// The context parameter is the packet struct the field lives in, so that
/// length fields can be derived from their sibling payload while encoding.
pub trait Convertable<Context>: Sized {
    /// Read this value from the cursor, advancing it
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self>;
    /// Append the wire form of this value to the buffer
    fn write_to_buffer(&self, buffer: &mut Vec<u8>, context: &Context) -> Result<()>;
    /// A representative value for the generated round-trip tests
    #[cfg(test)]
    fn get_test_value() -> Self;
    /// Round-trip equality, loose for values only known after parsing
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool;
}

impl<T> Convertable<T> for u8 {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        cursor.read_u8().map_err(Error::CursorEof)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.push(*self);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        1
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

// Bare u16 is little-endian. Art-Net uses it for exactly two fields, the
// opcode and the ArtPollReply port; every other multibyte field is U16Be.
impl<T> Convertable<T> for u16 {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        cursor.read_u16::<LittleEndian>().map_err(Error::CursorEof)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer
            .write_u16::<LittleEndian>(*self)
            .map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        0x1936
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

impl<T, const N: usize> Convertable<T> for [u8; N] {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let mut result = [0; N];
        cursor
            .read_exact(&mut result[..])
            .map_err(Error::CursorEof)?;
        Ok(result)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.extend_from_slice(&self[..]);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        [0; N]
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self[..] == other[..]
    }
}

impl<T> Convertable<T> for Ipv4Addr {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let octets: [u8; 4] = Convertable::<T>::from_cursor(cursor)?;
        Ok(Ipv4Addr::from(octets))
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.extend_from_slice(&self.octets());
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        Ipv4Addr::new(2, 0, 0, 1)
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

// Trailing opaque payload, takes whatever is left in the datagram
impl<T> Convertable<T> for Vec<u8> {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let remaining = cursor.get_ref();
        let inner = remaining[cursor.position() as usize..].to_vec();
        cursor.set_position(remaining.len() as u64);
        Ok(inner)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.extend_from_slice(&self[..]);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        vec![1, 2, 3, 4]
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// A big-endian u16 field
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct U16Be(pub u16);

impl<T> Convertable<T> for U16Be {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        cursor
            .read_u16::<BigEndian>()
            .map(U16Be)
            .map_err(Error::CursorEof)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.write_u16::<BigEndian>(self.0).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        U16Be(0x7FF0)
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

impl std::ops::Deref for U16Be {
    type Target = u16;
    fn deref(&self) -> &u16 {
        &self.0
    }
}

impl From<u16> for U16Be {
    fn from(value: u16) -> Self {
        U16Be(value)
    }
}

/// A big-endian u32 field
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct U32Be(pub u32);

impl<T> Convertable<T> for U32Be {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        cursor
            .read_u32::<BigEndian>()
            .map(U32Be)
            .map_err(Error::CursorEof)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.write_u32::<BigEndian>(self.0).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        U32Be(0x0000_0212)
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

impl std::ops::Deref for U32Be {
    type Target = u32;
    fn deref(&self) -> &u32 {
        &self.0
    }
}

/// A big-endian u16 at the tail of a packet that older senders omit.
///
/// ArtPoll grew its targeted-mode range and identity fields over protocol
/// revisions; a 14-byte legacy poll simply ends early and every omitted
/// field reads as zero.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct OptionalTailU16(pub u16);

impl<T> Convertable<T> for OptionalTailU16 {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        match cursor.read_u16::<BigEndian>() {
            Ok(value) => Ok(OptionalTailU16(value)),
            Err(_) => Ok(OptionalTailU16(0)),
        }
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.write_u16::<BigEndian>(self.0).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        OptionalTailU16(0x0123)
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

impl std::ops::Deref for OptionalTailU16 {
    type Target = u16;
    fn deref(&self) -> &u16 {
        &self.0
    }
}

/// A 6-byte RDM device identifier: 2-byte ESTA manufacturer, 4-byte device id
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uid(pub [u8; 6]);

impl Uid {
    /// The ESTA manufacturer half of the UID
    pub fn manufacturer(&self) -> u16 {
        u16::from_be_bytes([self.0[0], self.0[1]])
    }

    /// The device half of the UID
    pub fn device(&self) -> u32 {
        u32::from_be_bytes([self.0[2], self.0[3], self.0[4], self.0[5]])
    }
}

impl std::fmt::Display for Uid {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            fmt,
            "{:02X}{:02X}:{:02X}{:02X}{:02X}{:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3], self.0[4], self.0[5]
        )
    }
}

impl<T> Convertable<T> for Uid {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let octets: [u8; 6] = Convertable::<T>::from_cursor(cursor)?;
        Ok(Uid(octets))
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.extend_from_slice(&self.0);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        Uid([0x7F, 0xF0, 0, 0, 0, 1])
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// A trailing list of 6-byte UIDs, as carried by ArtTodData
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UidList(pub Vec<Uid>);

impl<T> Convertable<T> for UidList {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let remaining = cursor.get_ref();
        let tail = &remaining[cursor.position() as usize..];
        if tail.len() % 6 != 0 {
            return Err(Error::MessageSizeInvalid {
                message: tail.to_vec(),
                allowed_size: 0..(tail.len() / 6 + 1) * 6,
            });
        }
        let uids = tail
            .chunks_exact(6)
            .map(|chunk| {
                let mut octets = [0; 6];
                octets.copy_from_slice(chunk);
                Uid(octets)
            })
            .collect();
        cursor.set_position(remaining.len() as u64);
        Ok(UidList(uids))
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        for uid in &self.0 {
            buffer.extend_from_slice(&uid.0);
        }
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        UidList(vec![Uid([0x7F, 0xF0, 0, 0, 0, 1]), Uid([0x7F, 0xF0, 0, 0, 0, 2])])
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// Null-padded fixed-width ASCII, read until the first null
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FixedString<const N: usize>(pub String);

impl<const N: usize> FixedString<N> {
    /// Build a fixed string, silently truncating to the wire width minus the
    /// terminating null
    pub fn new(text: &str) -> Self {
        let mut text: String = text.chars().filter(char::is_ascii).collect();
        text.truncate(N - 1);
        FixedString(text)
    }
}

impl<const N: usize> std::fmt::Display for FixedString<N> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

impl<T, const N: usize> Convertable<T> for FixedString<N> {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let raw: [u8; N] = Convertable::<T>::from_cursor(cursor)?;
        let end = raw.iter().position(|&b| b == 0).unwrap_or(N);
        Ok(FixedString(
            String::from_utf8_lossy(&raw[..end]).into_owned(),
        ))
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        let mut raw = [0u8; N];
        let bytes = self.0.as_bytes();
        let len = bytes.len().min(N - 1);
        raw[..len].copy_from_slice(&bytes[..len]);
        buffer.extend_from_slice(&raw);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        FixedString::new("artnet node")
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// Packets whose body ends in null-terminated ASCII with a sibling length
/// field
pub trait TextPayload {
    /// The text the length field describes
    fn text(&self) -> &str;
}

/// Null-terminated ASCII occupying the rest of the datagram
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Text(pub String);

impl Text {
    /// Number of bytes this text occupies on the wire, terminator included
    pub fn wire_len(&self) -> u16 {
        self.0.len() as u16 + 1
    }
}

impl std::fmt::Display for Text {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{}", self.0)
    }
}

impl From<&str> for Text {
    fn from(text: &str) -> Self {
        Text(text.to_owned())
    }
}

impl<T> Convertable<T> for Text {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let remaining = cursor.get_ref();
        let tail = &remaining[cursor.position() as usize..];
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        cursor.set_position(remaining.len() as u64);
        Ok(Text(String::from_utf8_lossy(&tail[..end]).into_owned()))
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.extend_from_slice(self.0.as_bytes());
        buffer.push(0);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        Text("SwoutText=Stage left".to_owned())
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// The big-endian length of a sibling [`Text`] field, derived while encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextLength<T> {
    parsed_length: Option<u16>,
    _pd: std::marker::PhantomData<T>,
}

impl<T> Default for TextLength<T> {
    fn default() -> Self {
        TextLength {
            parsed_length: None,
            _pd: std::marker::PhantomData,
        }
    }
}

impl<T> TextLength<T> {
    /// The length carried by the packet, if this value was parsed
    pub fn parsed(&self) -> Option<u16> {
        self.parsed_length
    }
}

impl<T: TextPayload> Convertable<T> for TextLength<T> {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let length = cursor.read_u16::<BigEndian>().map_err(Error::CursorEof)?;
        Ok(TextLength {
            parsed_length: Some(length),
            _pd: std::marker::PhantomData,
        })
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, context: &T) -> Result<()> {
        let len = context.text().len() as u16 + 1;
        buffer.write_u16::<BigEndian>(len).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        Default::default()
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        match (self.parsed_length, other.parsed_length) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

/// Packets whose body ends in a DMX slot payload with a sibling length field
pub trait DmxData {
    /// The payload the length field describes
    fn dmx_data(&self) -> &SlotData;
}

/// DMX slot data, between 1 and 512 bytes.
///
/// The canonical frame is an even number of slots, but odd frames exist in
/// the wild and round-trip unchanged.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct SlotData {
    inner: Vec<u8>,
}

/// The most slots a single universe can carry
pub const DMX_SLOT_LIMIT: usize = 512;

impl SlotData {
    /// Number of slots in this payload
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl AsRef<Vec<u8>> for SlotData {
    fn as_ref(&self) -> &Vec<u8> {
        &self.inner
    }
}

impl AsMut<Vec<u8>> for SlotData {
    fn as_mut(&mut self) -> &mut Vec<u8> {
        &mut self.inner
    }
}

impl From<Vec<u8>> for SlotData {
    fn from(inner: Vec<u8>) -> Self {
        Self { inner }
    }
}

impl std::fmt::Debug for SlotData {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(fmt, "{:?}", self.inner)
    }
}

impl<T> Convertable<T> for SlotData {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let remaining = cursor.get_ref();
        let inner = remaining[cursor.position() as usize..].to_vec();
        if inner.is_empty() || inner.len() > DMX_SLOT_LIMIT {
            return Err(Error::MessageSizeInvalid {
                message: inner,
                allowed_size: 1..DMX_SLOT_LIMIT + 1,
            });
        }
        cursor.set_position(remaining.len() as u64);
        Ok(Self { inner })
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        let len = self.len();
        if len == 0 || len > DMX_SLOT_LIMIT {
            return Err(Error::MessageSizeInvalid {
                message: self.inner.clone(),
                allowed_size: 1..DMX_SLOT_LIMIT + 1,
            });
        }

        buffer.extend_from_slice(&self.inner[..]);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        SlotData {
            inner: vec![1, 2, 3, 4],
        }
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

/// The big-endian length of a sibling [`SlotData`] field.
///
/// On encode the value is derived from the payload, on decode it carries
/// whatever the sender wrote.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BigEndianLength<T> {
    pub(crate) parsed_length: Option<u16>,
    _pd: std::marker::PhantomData<T>,
}

impl<T> Default for BigEndianLength<T> {
    fn default() -> Self {
        BigEndianLength {
            parsed_length: None,
            _pd: std::marker::PhantomData,
        }
    }
}

impl<T> BigEndianLength<T> {
    /// The length carried by the packet, if this value was parsed
    pub fn parsed(&self) -> Option<u16> {
        self.parsed_length
    }
}

impl<T> std::fmt::Debug for BigEndianLength<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        if let Some(len) = &self.parsed_length {
            write!(fmt, "{}", len)
        } else {
            write!(fmt, "Unknown (set during parsing)")
        }
    }
}

impl<T> std::ops::Deref for BigEndianLength<T> {
    type Target = u16;

    fn deref(&self) -> &u16 {
        self.parsed_length.as_ref().unwrap_or(&0)
    }
}

impl<T: DmxData> Convertable<T> for BigEndianLength<T> {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let length = cursor.read_u16::<BigEndian>().map_err(Error::CursorEof)?;
        Ok(BigEndianLength {
            parsed_length: Some(length),
            _pd: std::marker::PhantomData,
        })
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, context: &T) -> Result<()> {
        let len = context.dmx_data().len() as u16;
        buffer.write_u16::<BigEndian>(len).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        Default::default()
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        // one side is freshly built and has no parsed length yet; we test
        // equality-after-parsing only when both sides carry a value
        match (self.parsed_length, other.parsed_length) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}
