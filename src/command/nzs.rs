use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::{BigEndianLength, Convertable, DmxData, SlotData};
use crate::{Error, PortAddress, Result};
use byteorder::{BigEndian, ReadBytesExt};
use std::io::Cursor;

/// The start code ArtVlc rides on
pub const VLC_START_CODE: u8 = 0x91;

/// The three magic bytes ("ALE") that open a VLC payload
pub const VLC_MAGIC: [u8; 3] = [0x41, 0x4C, 0x45];

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "ArtNzs carries a non-zero start code DMX512 frame for a single universe."]
    #[doc = ""]
    #[doc = "The null start code belongs in ArtDmx and RDM (0xCC) belongs in ArtRdm, so both are rejected here. Start code 0x91 with the \"ALE\" magic is a VLC transport frame, see [`Nzs::vlc`]."]
    pub struct Nzs {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "The sequence number, 0x00 disables resequencing"]
        pub sequence: u8,
        #[doc = "The DMX512 start code of this frame"]
        pub start_code: StartCode,
        #[doc = "The 15 bit Port-Address to which this packet is destined"]
        pub port_address: PortAddress,
        #[doc = "The length of the payload, set by the library itself while encoding"]
        pub length: BigEndianLength<Nzs>,
        #[doc = "A variable length array of DMX512 lighting data"]
        pub data: SlotData,
    }
}

impl DmxData for Nzs {
    fn dmx_data(&self) -> &SlotData {
        &self.data
    }
}

impl Default for Nzs {
    fn default() -> Nzs {
        Nzs {
            version: ARTNET_PROTOCOL_VERSION,
            sequence: 0,
            start_code: StartCode(VLC_START_CODE),
            port_address: 1.into(),
            length: BigEndianLength::default(),
            data: SlotData::default(),
        }
    }
}

/// A non-zero, non-RDM DMX512 start code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartCode(pub u8);

impl<T> Convertable<T> for StartCode {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let code = cursor.read_u8().map_err(Error::CursorEof)?;
        if code == 0x00 || code == 0xCC {
            return Err(Error::InvalidStartCode(code));
        }
        Ok(StartCode(code))
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        if self.0 == 0x00 || self.0 == 0xCC {
            return Err(Error::InvalidStartCode(self.0));
        }
        buffer.push(self.0);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        StartCode(VLC_START_CODE)
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// A VLC transport frame recovered from an ArtNzs payload
#[derive(Debug, Clone, PartialEq)]
pub struct Vlc {
    /// Bit 7 IEEE payload, bit 6 reply requested, bit 5 beacon mode
    pub flags: u8,
    /// Transaction number matching replies to requests
    pub transaction: u16,
    /// The DMX slot address this frame modulates
    pub slot_address: u16,
    /// Number of payload bytes
    pub payload_count: u16,
    /// 16-bit wrap-add checksum over the payload
    pub payload_checksum: u16,
    /// Modulation depth as a percentage multiplied by 10
    pub depth: u8,
    /// Modulation frequency in Hz
    pub frequency: u16,
    /// Modulation type
    pub modulation: u16,
    /// Language of the payload
    pub payload_language: u16,
    /// Beacon repeat frequency
    pub beacon_repeat: u16,
    /// The transported bytes
    pub payload: Vec<u8>,
}

/// Sub-header length of a VLC frame, magic included
const VLC_HEADER_LEN: usize = 22;

/// 16-bit wrap-add over a byte slice, the checksum VLC and firmware uploads
/// both use
pub fn wrap_add_checksum(bytes: &[u8]) -> u16 {
    bytes
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16))
}

impl Nzs {
    /// Sniff this frame for a VLC payload.
    ///
    /// Returns `Ok(None)` when the frame is plain NZS data, `Ok(Some(_))` for
    /// a verified VLC frame, and an error when the frame claims to be VLC but
    /// its sub-header or checksum is broken.
    pub fn vlc(&self) -> Result<Option<Vlc>> {
        let data = self.data.as_ref();
        if self.start_code.0 != VLC_START_CODE || !data.starts_with(&VLC_MAGIC) {
            return Ok(None);
        }
        if data.len() < VLC_HEADER_LEN {
            return Err(Error::MessageTooShort {
                message: data.clone(),
                min_len: VLC_HEADER_LEN,
            });
        }

        let mut cursor = Cursor::new(&data[VLC_MAGIC.len()..]);
        let read_u16 =
            |cursor: &mut Cursor<&[u8]>| cursor.read_u16::<BigEndian>().map_err(Error::CursorEof);

        let flags = cursor.read_u8().map_err(Error::CursorEof)?;
        let transaction = read_u16(&mut cursor)?;
        let slot_address = read_u16(&mut cursor)?;
        let payload_count = read_u16(&mut cursor)?;
        let payload_checksum = read_u16(&mut cursor)?;
        let _spare = cursor.read_u8().map_err(Error::CursorEof)?;
        let depth = cursor.read_u8().map_err(Error::CursorEof)?;
        let frequency = read_u16(&mut cursor)?;
        let modulation = read_u16(&mut cursor)?;
        let payload_language = read_u16(&mut cursor)?;
        let beacon_repeat = read_u16(&mut cursor)?;

        let payload_start = VLC_HEADER_LEN;
        let payload_end = payload_start + payload_count as usize;
        if data.len() < payload_end {
            return Err(Error::MessageTooShort {
                message: data.clone(),
                min_len: payload_end,
            });
        }
        let payload = data[payload_start..payload_end].to_vec();

        let actual = wrap_add_checksum(&payload);
        if actual != payload_checksum {
            return Err(Error::ChecksumMismatch {
                expected: payload_checksum,
                actual,
            });
        }

        Ok(Some(Vlc {
            flags,
            transaction,
            slot_address,
            payload_count,
            payload_checksum,
            depth,
            frequency,
            modulation,
            payload_language,
            beacon_repeat,
            payload,
        }))
    }
}
