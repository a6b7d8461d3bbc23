use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::{U16Be, UidList};

/// The most UIDs a single ArtTodData packet can carry
pub const TOD_DATA_MAX_UIDS: usize = 200;

/// CommandResponse value for a full, valid table
pub const TOD_FULL: u8 = 0x00;

/// CommandResponse value when the table is incomplete or discovery is still
/// running
pub const TOD_NAK: u8 = 0xFF;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "A node's Table of Devices for one port, sent in blocks of up to 200 UIDs."]
    pub struct TodData {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "The RDM standard supported, 0x01 for V1.0"]
        pub rdm_version: u8,
        #[doc = "The physical port the table belongs to, 1 to 4"]
        pub port: u8,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 6],
        #[doc = "The bind index of the page carrying this port"]
        pub bind_index: u8,
        #[doc = "The top 7 bits of the port's Port-Address"]
        pub net: u8,
        #[doc = "0x00 TodFull, 0xFF TodNak (table incomplete)"]
        pub command_response: u8,
        #[doc = "The low byte (Sub-Net and Universe) of the port's Port-Address"]
        pub address: u8,
        #[doc = "The full number of UIDs in the table, across all blocks"]
        pub uid_total: U16Be,
        #[doc = "Which block of the table this packet is, counting from 0"]
        pub block_count: u8,
        #[doc = "The number of UIDs in this packet"]
        pub uid_count: u8,
        #[doc = "The UIDs themselves"]
        pub tod: UidList,
    }
}

impl Default for TodData {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            rdm_version: 1,
            port: 1,
            spare: [0; 6],
            bind_index: 1,
            net: 0,
            command_response: TOD_FULL,
            address: 0,
            uid_total: U16Be(0),
            block_count: 0,
            uid_count: 0,
            tod: UidList::default(),
        }
    }
}

impl TodData {
    /// The Port-Address this table belongs to
    pub fn port_address(&self) -> crate::PortAddress {
        crate::PortAddress::compose(self.net, self.address >> 4, self.address & 0x0F)
    }
}
