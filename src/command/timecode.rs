use std::convert::TryFrom;

use byteorder::{ReadBytesExt, WriteBytesExt};

use crate::convert::Convertable;
use crate::{Error, Result, ARTNET_PROTOCOL_VERSION};

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Transports time code over the network."]
    #[doc = ""]
    #[doc = "The legal range of the frames field depends on the frame type, so the wire layout alone cannot reject a bad packet; the node checks [`Timecode::validate`] before surfacing a frame and drops out-of-range ones."]
    pub struct Timecode {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],

        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler1: u8,
        #[doc = "Used to identify different streams of time code. Value of 0x00 is the master"]
        pub stream_id: u8,
        #[doc = "Frames time, bounded by the frame type, see [`FrameType::max_frame`]"]
        pub frames: u8,
        #[doc = "Seconds. 0 - 59"]
        pub seconds: u8,
        #[doc = "Minutes. 0 - 59"]
        pub minutes: u8,
        #[doc = "Hours. 0 - 23"]
        pub hours: u8,
        #[doc = "The framerate of this stream"]
        pub frame_type: FrameType,
    }
}

impl Default for Timecode {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler1: 0,
            stream_id: 0,
            frames: 0,
            seconds: 0,
            minutes: 0,
            hours: 0,
            frame_type: FrameType::Smpte,
        }
    }
}

impl Timecode {
    /// Check every time field against its legal range.
    ///
    /// The frames bound follows the frame type; the clock fields are plain
    /// wall-clock bounds.
    pub fn validate(&self) -> Result<()> {
        let checks = [
            ("Timecode::frames", self.frame_type.max_frame(), self.frames),
            ("Timecode::seconds", 59, self.seconds),
            ("Timecode::minutes", 59, self.minutes),
            ("Timecode::hours", 23, self.hours),
        ];
        for (field, max, actual) in checks {
            if actual > max {
                return Err(Error::ValueOutOfRange { field, max, actual });
            }
        }
        Ok(())
    }
}

/// The framerate being used for a particular [Timecode] stream.
#[repr(u8)]
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum FrameType {
    /// Film, 24 fps
    Film = 0,
    /// EBU, 25 fps
    Ebu = 1,
    /// Drop frame, 29.97 fps
    Df = 2,
    /// SMPTE, 30 fps
    Smpte = 3,
}

impl FrameType {
    /// Nominal frames per second of the stream
    pub fn fps(self) -> f32 {
        match self {
            FrameType::Film => 24.0,
            FrameType::Ebu => 25.0,
            FrameType::Df => 29.97,
            FrameType::Smpte => 30.0,
        }
    }

    /// The largest legal value of the frames field for this framerate
    pub fn max_frame(self) -> u8 {
        match self {
            FrameType::Film => 23,
            FrameType::Ebu => 24,
            FrameType::Df | FrameType::Smpte => 29,
        }
    }
}

impl TryFrom<u8> for FrameType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(FrameType::Film),
            1 => Ok(FrameType::Ebu),
            2 => Ok(FrameType::Df),
            3 => Ok(FrameType::Smpte),
            _ => Err(Error::InvalidTimecodeFrameType(value)),
        }
    }
}

impl<T> Convertable<T> for FrameType {
    fn from_cursor(cursor: &mut std::io::Cursor<&[u8]>) -> Result<Self> {
        let number = cursor.read_u8().map_err(Error::CursorEof)?;
        FrameType::try_from(number)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _context: &T) -> Result<()> {
        buffer.write_u8(*self as u8).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        FrameType::try_from(1).unwrap()
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
    fn the_frames_bound_follows_the_frame_type() {
        let film_frame_24 = Timecode {
            frames: 24,
            frame_type: FrameType::Film,
            ..Timecode::default()
        };
        assert!(matches!(
            film_frame_24.validate(),
            Err(Error::ValueOutOfRange {
                field: "Timecode::frames",
                max: 23,
                ..
            })
        ));

        let smpte_frame_24 = Timecode {
            frames: 24,
            ..Timecode::default()
        };
        assert!(smpte_frame_24.validate().is_ok());
    }

    #[test]
    fn clock_fields_are_wall_clock_bounded() {
        let bad_seconds = Timecode {
            seconds: 60,
            ..Timecode::default()
        };
        assert!(bad_seconds.validate().is_err());
        let bad_hours = Timecode {
            hours: 24,
            ..Timecode::default()
        };
        assert!(bad_hours.validate().is_err());

        let midnight = Timecode::default();
        assert!(midnight.validate().is_ok());
    }

    #[test]
    fn frame_rates_match_their_type() {
        assert_eq!(FrameType::Film.fps(), 24.0);
        assert_eq!(FrameType::Df.max_frame(), 29);
        assert!(FrameType::try_from(4).is_err());
    }
}
