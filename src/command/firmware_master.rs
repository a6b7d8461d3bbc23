use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::{Convertable, U32Be};
use crate::{Error, Result};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;
use std::io::Cursor;

/// The kind and position of a firmware upload block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// The first block of a firmware upload
    FirmFirst,
    /// A continuation block of a firmware upload
    FirmCont,
    /// The final block of a firmware upload
    FirmLast,
    /// The first block of a UBEA upload
    UbeaFirst,
    /// A continuation block of a UBEA upload
    UbeaCont,
    /// The final block of a UBEA upload
    UbeaLast,
}

impl BlockType {
    /// Whether this block opens a new upload session
    pub fn is_first(self) -> bool {
        matches!(self, BlockType::FirmFirst | BlockType::UbeaFirst)
    }

    /// Whether this block closes an upload session
    pub fn is_last(self) -> bool {
        matches!(self, BlockType::FirmLast | BlockType::UbeaLast)
    }

    /// Whether this block belongs to a UBEA upload rather than firmware
    pub fn is_ubea(self) -> bool {
        matches!(
            self,
            BlockType::UbeaFirst | BlockType::UbeaCont | BlockType::UbeaLast
        )
    }
}

impl TryFrom<u8> for BlockType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(BlockType::FirmFirst),
            0x01 => Ok(BlockType::FirmCont),
            0x02 => Ok(BlockType::FirmLast),
            0x03 => Ok(BlockType::UbeaFirst),
            0x04 => Ok(BlockType::UbeaCont),
            0x05 => Ok(BlockType::UbeaLast),
            other => Err(Error::FieldMismatch {
                field: "FirmwareMaster::block_type",
                expected: 0x00,
                actual: other,
            }),
        }
    }
}

impl From<BlockType> for u8 {
    fn from(block_type: BlockType) -> u8 {
        match block_type {
            BlockType::FirmFirst => 0x00,
            BlockType::FirmCont => 0x01,
            BlockType::FirmLast => 0x02,
            BlockType::UbeaFirst => 0x03,
            BlockType::UbeaCont => 0x04,
            BlockType::UbeaLast => 0x05,
        }
    }
}

impl<T> Convertable<T> for BlockType {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let number = cursor.read_u8().map_err(Error::CursorEof)?;
        BlockType::try_from(number)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _context: &T) -> Result<()> {
        buffer.write_u8((*self).into()).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        BlockType::FirmFirst
    }

    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

/// A firmware block payload. Blocks carry 16-bit words, so an odd byte count
/// cannot exist on the wire and is rejected while decoding.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AlignedData(pub Vec<u8>);

impl<T> Convertable<T> for AlignedData {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let remaining = cursor.get_ref();
        let inner = remaining[cursor.position() as usize..].to_vec();
        if inner.len() % 2 != 0 {
            return Err(Error::UnalignedBlock(inner.len()));
        }
        cursor.set_position(remaining.len() as u64);
        Ok(AlignedData(inner))
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        if self.0.len() % 2 != 0 {
            return Err(Error::UnalignedBlock(self.0.len()));
        }
        buffer.extend_from_slice(&self.0);
        Ok(())
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        AlignedData(vec![0xDE, 0xAD, 0xBE, 0xEF])
    }

    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "One block of a firmware or UBEA upload."]
    #[doc = ""]
    #[doc = "The advertised firmware length is a count of 16-bit words; block payloads are 16-bit aligned and at most 512 words each."]
    pub struct FirmwareMaster {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler1: u8,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler2: u8,
        #[doc = "Where in the upload this block sits, see [`BlockType`]"]
        pub block_type: BlockType,
        #[doc = "Counts blocks modulo 256, starting at 0 with the first"]
        pub block_id: u8,
        #[doc = "The total upload length in 16-bit words"]
        pub firmware_length: U32Be,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 20],
        #[doc = "The block payload, 16-bit aligned"]
        pub data: AlignedData,
    }
}

impl Default for FirmwareMaster {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler1: 0,
            filler2: 0,
            block_type: BlockType::FirmFirst,
            block_id: 0,
            firmware_length: U32Be(0),
            spare: [0; 20],
            data: AlignedData::default(),
        }
    }
}
