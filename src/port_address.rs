use crate::convert::Convertable;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::io::Cursor;

/// A `PortAddress` is an unsigned integer from 0 to 32_767 (15-bit), composed
/// of a 7-bit Net, a 4-bit Sub-Net and a 4-bit Universe.
///
/// The trait `From` is implemented for `u8` and `TryFrom` for `u16` and `i32`:
///
/// ```
/// use artnet_node::PortAddress;
/// use std::convert::TryInto;
/// let a: PortAddress = 1.into(); // convert from u8 never fails
/// let b: PortAddress = 2u16.try_into().unwrap(); // u16 could fail if too big
/// let c: PortAddress = 3_000.try_into().unwrap(); // i32 could fail if too big or negative
/// let composed = PortAddress::compose(1, 2, 3);
/// assert_eq!(composed.split(), (1, 2, 3));
/// assert_eq!(u16::from(composed), 0x123);
/// ```
///
/// Port-Address 0 is deprecated; it still decodes, and the node warns the
/// first time it outputs on it.
#[derive(
    Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PortAddress(u16);

// basic support for u8 literals
impl From<u8> for PortAddress {
    fn from(value: u8) -> Self {
        // cannot over/underflow
        PortAddress(value as u16)
    }
}

impl TryFrom<u16> for PortAddress {
    type Error = Error;
    fn try_from(value: u16) -> Result<Self> {
        if value <= 32_767 {
            Ok(PortAddress(value))
        } else {
            Err(Error::InvalidPortAddress(value))
        }
    }
}

// support un-annotated literals
impl TryFrom<i32> for PortAddress {
    type Error = Error;
    fn try_from(value: i32) -> Result<Self> {
        if (0..=32_767).contains(&value) {
            Ok(PortAddress(value as u16))
        } else {
            Err(Error::InvalidPortAddress(value as u16))
        }
    }
}

impl From<PortAddress> for u16 {
    fn from(value: PortAddress) -> u16 {
        value.0
    }
}

impl std::fmt::Display for PortAddress {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        let (net, sub_net, universe) = self.split();
        write!(fmt, "{}:{}:{}", net, sub_net, universe)
    }
}

impl PortAddress {
    /// Compose a Port-Address out of its three switch fields. Out-of-range
    /// bits are masked off, so the result is always a valid address.
    pub fn compose(net: u8, sub_net: u8, universe: u8) -> PortAddress {
        PortAddress(
            ((net as u16 & 0x7F) << 8) | ((sub_net as u16 & 0x0F) << 4) | (universe as u16 & 0x0F),
        )
    }

    /// Split this Port-Address back into `(net, sub_net, universe)`
    pub fn split(self) -> (u8, u8, u8) {
        (
            ((self.0 >> 8) & 0x7F) as u8,
            ((self.0 >> 4) & 0x0F) as u8,
            (self.0 & 0x0F) as u8,
        )
    }

    /// The 7-bit Net switch
    pub fn net(self) -> u8 {
        self.split().0
    }

    /// The 4-bit Sub-Net switch
    pub fn sub_net(self) -> u8 {
        self.split().1
    }

    /// The 4-bit Universe switch
    pub fn universe(self) -> u8 {
        self.split().2
    }

    /// Whether this is the deprecated all-zero address
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// The address as big-endian bytes
    pub fn to_be_bytes(self) -> [u8; 2] {
        self.0.to_be_bytes()
    }

    /// The address as little-endian bytes, the form ArtDmx carries it in
    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

// ArtDmx and ArtNzs carry the Port-Address as SubUni then Net, which is a
// little-endian u16 of the composed value
impl<T> Convertable<T> for PortAddress {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let value = cursor.read_u16::<LittleEndian>().map_err(Error::CursorEof)?;
        PortAddress::try_from(value)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer
            .write_u16::<LittleEndian>(self.0)
            .map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        PortAddress::compose(1, 2, 3)
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_address_to_bytes() {
        use std::convert::TryInto;
        let a: PortAddress = 0x1234.try_into().unwrap();
        assert!(a.to_be_bytes() == [0x12, 0x34]);
        assert!(a.to_le_bytes() == [0x34, 0x12]);
    }

    #[test]
    fn port_address_bound_check() {
        use std::convert::TryInto;
        assert!(
            PortAddress::try_from(32_768u16).is_err(),
            "u16 values over 32_767 should not convert to PortAddress succesfully"
        );
        assert!(
            PortAddress::try_from(32_768).is_err(),
            "i32 values over 32_767 should not convert to PortAddress succesfully"
        );
        assert!(
            PortAddress::try_from(-1).is_err(),
            "negative i32 values should not convert to PortAddress succesfully"
        );

        // should run without panic:
        let _c: PortAddress = 0.into();
        let _d: PortAddress = 255.into();
        let _e: PortAddress = 32_767.try_into().unwrap();
        let _f: PortAddress = 256.try_into().unwrap();
    }

    #[test]
    fn compose_split_round_trips() {
        for net in [0u8, 1, 64, 127] {
            for sub_net in [0u8, 2, 15] {
                for universe in [0u8, 3, 15] {
                    let address = PortAddress::compose(net, sub_net, universe);
                    assert!(u16::from(address) <= 32_767);
                    assert_eq!(address.split(), (net, sub_net, universe));
                }
            }
        }
    }

    #[test]
    fn compose_masks_out_of_range_switches() {
        // a net of 0xFF only keeps its low 7 bits
        assert_eq!(
            PortAddress::compose(0xFF, 0xFF, 0xFF),
            PortAddress::compose(0x7F, 0x0F, 0x0F)
        );
    }

    #[test]
    fn scenario_net1_sub2_universe3_is_291() {
        assert_eq!(u16::from(PortAddress::compose(1, 2, 3)), 291);
    }
}
