use crate::command::ARTNET_PROTOCOL_VERSION;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "A controller asking for the Table of Devices discovered on a node's ports."]
    #[doc = ""]
    #[doc = "The request names a Net and up to 32 low bytes of Port-Addresses; an empty list asks for every port on that Net."]
    pub struct TodRequest {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler1: u8,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler2: u8,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 7],
        #[doc = "The top 7 bits of the Port-Addresses being asked about"]
        pub net: u8,
        #[doc = "0x00 TodFull is the only defined request"]
        pub command: u8,
        #[doc = "How many entries of `address` are meaningful"]
        pub add_count: u8,
        #[doc = "The low bytes (Sub-Net and Universe) of the Port-Addresses being asked about, up to 32"]
        pub address: Vec<u8>,
    }
}

impl Default for TodRequest {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler1: 0,
            filler2: 0,
            spare: [0; 7],
            net: 0,
            command: 0,
            add_count: 0,
            address: Vec::new(),
        }
    }
}

impl TodRequest {
    /// The Port-Addresses this request names, composed with its Net
    pub fn port_addresses(&self) -> Vec<crate::PortAddress> {
        self.address
            .iter()
            .take(self.add_count.min(32) as usize)
            .map(|&low| crate::PortAddress::compose(self.net, low >> 4, low & 0x0F))
            .collect()
    }
}
