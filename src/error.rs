/// The result type used throughout the wire codec
pub type Result<T> = std::result::Result<T, Error>;

/// All the ways a datagram can fail to encode or decode
#[derive(Debug)]
pub enum Error {
    /// Could not read or write to the inner cursor
    CursorEof(std::io::Error),

    /// Could not serialize an artnet packet field
    SerializeError(&'static str, Box<Error>),

    /// Could not deserialize an artnet packet field
    DeserializeError(&'static str, Box<Error>),

    /// The given message was not long enough
    MessageTooShort {
        /// The message that was too short
        message: Vec<u8>,
        /// The minimum length the message needed to be
        min_len: usize,
    },

    /// A variable payload was outside its allowed size
    MessageSizeInvalid {
        /// The offending payload
        message: Vec<u8>,
        /// The size range the payload must fall in
        allowed_size: std::ops::Range<usize>,
    },

    /// The artnet header is invalid
    InvalidArtnetHeader(Vec<u8>),

    /// Could not parse the given opcode
    OpcodeError(&'static str, Box<Error>),

    /// Unknown opcode ID
    UnknownOpcode(u16),

    /// A field did not hold the byte value the layout requires
    FieldMismatch {
        /// The name of the offending field
        field: &'static str,
        /// What the layout requires
        expected: u8,
        /// What the datagram held
        actual: u8,
    },

    /// A 16-bit wrap-add checksum did not verify
    ChecksumMismatch {
        /// The checksum carried in the packet
        expected: u16,
        /// The checksum computed over the payload
        actual: u16,
    },

    /// A firmware block payload was not 16-bit aligned
    UnalignedBlock(usize),

    /// A Port-Address above 32767 cannot exist on the wire
    InvalidPortAddress(u16),

    /// ArtNzs carries neither the null start code nor RDM
    InvalidStartCode(u8),

    /// The timecode frame type byte is out of range
    InvalidTimecodeFrameType(u8),

    /// A field exceeded the largest value its layout allows
    ValueOutOfRange {
        /// The name of the offending field
        field: &'static str,
        /// The largest legal value
        max: u8,
        /// What the packet held
        actual: u8,
    },

    /// The RDM command class byte is not GET/GET_RESPONSE/SET/SET_RESPONSE
    InvalidRdmCommandClass(u8),
}

impl std::fmt::Display for Error {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::CursorEof(inner) => write!(fmt, "Cursor EOF: {}", inner),
            Error::SerializeError(message, inner) => write!(fmt, "{}: {}", message, inner),
            Error::DeserializeError(message, inner) => write!(fmt, "{}: {}", message, inner),
            Error::MessageTooShort { min_len, message } => write!(
                fmt,
                "Message too short, got {}, need {}",
                message.len(),
                min_len
            ),
            Error::MessageSizeInvalid {
                message,
                allowed_size,
            } => write!(
                fmt,
                "Payload size {} outside of allowed range {:?}",
                message.len(),
                allowed_size
            ),
            Error::InvalidArtnetHeader(_) => write!(fmt, "Invalid artnet header"),
            Error::OpcodeError(opcode, inner) => {
                write!(fmt, "Could not parse opcode {:?}: {}", opcode, inner)
            }
            Error::UnknownOpcode(opcode) => write!(fmt, "Unknown opcode 0x{:X}", opcode),
            Error::FieldMismatch {
                field,
                expected,
                actual,
            } => write!(
                fmt,
                "Field {} must be 0x{:02X}, got 0x{:02X}",
                field, expected, actual
            ),
            Error::ChecksumMismatch { expected, actual } => write!(
                fmt,
                "Checksum mismatch, packet carries 0x{:04X}, payload sums to 0x{:04X}",
                expected, actual
            ),
            Error::UnalignedBlock(len) => {
                write!(fmt, "Block payload of {} bytes is not 16-bit aligned", len)
            }
            Error::InvalidPortAddress(value) => {
                write!(fmt, "Port-Address must be 0..=32767, got {}", value)
            }
            Error::InvalidStartCode(value) => {
                write!(fmt, "Start code 0x{:02X} may not be carried by ArtNzs", value)
            }
            Error::InvalidTimecodeFrameType(value) => {
                write!(fmt, "Invalid timecode frame type {}", value)
            }
            Error::ValueOutOfRange { field, max, actual } => {
                write!(fmt, "Field {} must be at most {}, got {}", field, max, actual)
            }
            Error::InvalidRdmCommandClass(value) => {
                write!(fmt, "Invalid RDM command class 0x{:02X}", value)
            }
        }
    }
}

impl std::error::Error for Error {}
