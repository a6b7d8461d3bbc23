use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::U16Be;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Enables or disables the DMX inputs of a node. Bit 0 of each entry set means the input is disabled."]
    pub struct Input {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler1: u8,
        #[doc = "The bind index of the port page this packet configures"]
        pub bind_index: u8,
        #[doc = "The number of input ports the sender believes this page has"]
        pub num_ports: U16Be,
        #[doc = "One entry per port, bit 0 set disables the input"]
        pub input: [u8; 4],
    }
}

impl Default for Input {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler1: 0,
            bind_index: 1,
            num_ports: U16Be(0),
            input: [0; 4],
        }
    }
}

impl Input {
    /// Which of the four inputs this packet disables
    pub fn disabled(&self) -> [bool; 4] {
        [
            self.input[0] & 1 != 0,
            self.input[1] & 1 != 0,
            self.input[2] & 1 != 0,
            self.input[3] & 1 != 0,
        ]
    }
}
