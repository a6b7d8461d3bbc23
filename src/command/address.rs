use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::FixedString;

/// The value that resets a programmable field back to its factory default
pub const RESET_TO_DEFAULT: u8 = 0x00;

/// The bit that marks a switch byte as "program me"
pub const PROGRAM_BIT: u8 = 0x80;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Remote programming of a node: names, switch nibbles, port configuration and the one-shot command byte."]
    #[doc = ""]
    #[doc = "Switch bytes use a flagged encoding: 0x00 resets the field to its factory default, a set top bit programs the low bits, anything else leaves the field alone."]
    pub struct Address {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Bits 14-8 of the Port-Address, flagged encoding over the low 7 bits"]
        pub net_switch: u8,
        #[doc = "The bind index of the port page this packet programs, 0 and 1 both mean the root page"]
        pub bind_index: u8,
        #[doc = "New short name; a null string resets the name to its factory default"]
        pub short_name: FixedString<18>,
        #[doc = "New long name; a null string resets the name to its factory default"]
        pub long_name: FixedString<64>,
        #[doc = "Universe nibble of each input port, flagged encoding"]
        pub sw_in: [u8; 4],
        #[doc = "Universe nibble of each output port, flagged encoding"]
        pub sw_out: [u8; 4],
        #[doc = "Bits 7-4 of the Port-Address, flagged encoding over the low 4 bits"]
        pub sub_switch: u8,
        #[doc = "The sACN priority to transmit with: 0 resets, 1..=200 programs, anything else is ignored"]
        pub acn_priority: u8,
        #[doc = "One-shot node command, see the address-command table"]
        pub command: u8,
    }
}

impl Default for Address {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            net_switch: 0x7F, // no change
            bind_index: 1,
            short_name: FixedString::default(),
            long_name: FixedString::default(),
            sw_in: [0x7F; 4],
            sw_out: [0x7F; 4],
            sub_switch: 0x7F,
            acn_priority: 0xFF,
            command: 0,
        }
    }
}
