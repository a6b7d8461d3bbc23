use crate::convert::Convertable;
use crate::{Error, Result};
use byteorder::ReadBytesExt;
use std::io::Cursor;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    /// The TalkToMe flags carried by ArtPoll, deciding how a node replies
    pub struct ArtTalkToMe: u8 {
        /// Reply immediately instead of after a random 0..1000 ms delay
        const SUPPRESS_REPLY_DELAY = 0b0000_0001;

        /// Send an unsolicited ArtPollReply whenever node state changes
        const REPLY_ON_CHANGE = 0b0000_0010;

        /// Subscribe the sender to diagnostic messages
        const ENABLE_DIAGNOSTICS = 0b0000_0100;

        /// Diagnostic messages are unicast to the sender rather than
        /// broadcast. Has no effect unless `ENABLE_DIAGNOSTICS` is set.
        const UNICAST_DIAGNOSTICS = 0b0000_1000;

        /// Disable VLC transmission
        const DISABLE_VLC = 0b0001_0000;

        /// Only reply when a port page falls inside the target range
        const TARGETED_MODE = 0b0010_0000;

        /// No flags
        const NONE = 0b0000_0000;
    }
}

impl<T> Convertable<T> for ArtTalkToMe {
    fn from_cursor(cursor: &mut Cursor<&[u8]>) -> Result<Self> {
        let b = cursor.read_u8().map_err(Error::CursorEof)?;
        Ok(ArtTalkToMe::from_bits_truncate(b))
    }
    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> Result<()> {
        buffer.push(self.bits());
        Ok(())
    }
    #[cfg(test)]
    fn get_test_value() -> Self {
        ArtTalkToMe::NONE
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// General status register reported in ArtPollReply
    pub struct Status1: u8 {
        /// A UBEA is present
        const UBEA_PRESENT = 0b0000_0001;
        /// The node is capable of RDM
        const RDM_CAPABLE = 0b0000_0010;
        /// The node booted from ROM
        const ROM_BOOT = 0b0000_0100;
        /// Port-Address programmed by front panel
        const ADDRESS_FRONT_PANEL = 0b0001_0000;
        /// Port-Address programmed over the network
        const ADDRESS_NETWORK = 0b0010_0000;
        /// Indicators in locate mode (with `INDICATOR_MUTE` unset)
        const INDICATOR_LOCATE = 0b0100_0000;
        /// Indicators in mute mode (with `INDICATOR_LOCATE` unset)
        const INDICATOR_MUTE = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Extended status register reported in ArtPollReply
    pub struct Status2: u8 {
        /// Product supports web browser configuration
        const WEB_CONFIG = 0b0000_0001;
        /// The node's IP was set by DHCP
        const DHCP_ACTIVE = 0b0000_0010;
        /// The node is capable of DHCP
        const DHCP_CAPABLE = 0b0000_0100;
        /// The node supports 15-bit Port-Addresses (Art-Net 3 or later)
        const PORT_ADDRESS_15BIT = 0b0000_1000;
        /// The node can switch between Art-Net and sACN
        const SACN_SWITCHABLE = 0b0001_0000;
        /// The node is squawking
        const SQUAWKING = 0b0010_0000;
        /// Output style can be switched over the network
        const STYLE_SWITCHABLE = 0b0100_0000;
        /// RDM background queue is supported
        const BACKGROUND_QUEUE = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Third status register reported in ArtPollReply
    pub struct Status3: u8 {
        /// Outputs can be switched between input and output mode
        const OUTPUT_SWITCHABLE = 0b0000_1000;
        /// The node supports LLRP
        const LLRP_CAPABLE = 0b0001_0000;
        /// The node supports failsafe playback
        const FAILSAFE_CAPABLE = 0b0010_0000;
    }
}

impl Status3 {
    /// Mask of the two failsafe-mode bits
    pub const FAILSAFE_MODE_MASK: u8 = 0b1100_0000;

    /// Merge a 2-bit failsafe mode value into the register byte
    pub fn with_failsafe_bits(self, mode_bits: u8) -> u8 {
        self.bits() | ((mode_bits << 6) & Self::FAILSAFE_MODE_MASK)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Per-port input status, the `GoodInput` array of ArtPollReply
    pub struct GoodInput: u8 {
        /// Receive errors were detected
        const ERRORS = 0b0000_0100;
        /// The input is disabled
        const DISABLED = 0b0000_1000;
        /// The port has received DMX text packets
        const TEXT_PACKETS = 0b0001_0000;
        /// The port has received DMX SIPs
        const SIPS = 0b0010_0000;
        /// The port has received DMX test packets
        const TEST_PACKETS = 0b0100_0000;
        /// Data is being received
        const DATA_RECEIVED = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Per-port output status, the `GoodOutputA` array of ArtPollReply
    pub struct GoodOutputA: u8 {
        /// The port outputs sACN instead of Art-Net
        const SACN = 0b0000_0001;
        /// The port merges in LTP mode
        const MERGE_LTP = 0b0000_0010;
        /// The DMX output is shorted
        const OUTPUT_SHORT = 0b0000_0100;
        /// The port is merging data from two sources
        const MERGING = 0b0000_1000;
        /// The port is sending DMX text packets
        const TEXT_PACKETS = 0b0001_0000;
        /// The port is sending DMX SIPs
        const SIPS = 0b0010_0000;
        /// The port is sending DMX test packets
        const TEST_PACKETS = 0b0100_0000;
        /// Data is being transmitted
        const DATA_TRANSMITTED = 0b1000_0000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// Per-port capability byte, the `PortTypes` array of ArtPollReply
    pub struct PortType: u8 {
        /// The port can output data onto DMX512
        const OUTPUT = 0b1000_0000;
        /// The port can input data from DMX512
        const INPUT = 0b0100_0000;
    }
}
