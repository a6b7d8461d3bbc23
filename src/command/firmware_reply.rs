use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::Convertable;
use crate::{Error, Result};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;

/// A node's verdict on a firmware block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirmwareReplyStatus {
    /// The block was received intact
    BlockGood,
    /// The whole upload was received and its checksum verified
    AllGood,
    /// The upload failed and the session was dropped
    Fail,
}

impl TryFrom<u8> for FirmwareReplyStatus {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(FirmwareReplyStatus::BlockGood),
            0x01 => Ok(FirmwareReplyStatus::AllGood),
            0xFF => Ok(FirmwareReplyStatus::Fail),
            other => Err(Error::FieldMismatch {
                field: "FirmwareReply::status",
                expected: 0x00,
                actual: other,
            }),
        }
    }
}

impl From<FirmwareReplyStatus> for u8 {
    fn from(status: FirmwareReplyStatus) -> u8 {
        match status {
            FirmwareReplyStatus::BlockGood => 0x00,
            FirmwareReplyStatus::AllGood => 0x01,
            FirmwareReplyStatus::Fail => 0xFF,
        }
    }
}

impl<T> Convertable<T> for FirmwareReplyStatus {
    fn from_cursor(cursor: &mut std::io::Cursor<&[u8]>) -> Result<Self> {
        let number = cursor.read_u8().map_err(Error::CursorEof)?;
        FirmwareReplyStatus::try_from(number)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _context: &T) -> Result<()> {
        buffer.write_u8((*self).into()).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        FirmwareReplyStatus::BlockGood
    }

    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Acknowledges one ArtFirmwareMaster block."]
    pub struct FirmwareReply {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler1: u8,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler2: u8,
        #[doc = "The verdict, see [`FirmwareReplyStatus`]"]
        pub status: FirmwareReplyStatus,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 21],
    }
}

impl Default for FirmwareReply {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler1: 0,
            filler2: 0,
            status: FirmwareReplyStatus::BlockGood,
            spare: [0; 21],
        }
    }
}

impl FirmwareReply {
    /// Build a reply carrying the given verdict
    pub fn with_status(status: FirmwareReplyStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}
