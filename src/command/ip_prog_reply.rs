use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::U16Be;
use std::net::Ipv4Addr;

/// Bit 6 of the reply status byte: DHCP is enabled on the node
pub const IP_PROG_STATUS_DHCP: u8 = 0b0100_0000;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Mirrors the node's network configuration back at the sender of an ArtIpProg."]
    pub struct IpProgReply {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler: [u8; 4],
        #[doc = "The node's current IP address"]
        pub ip: Ipv4Addr,
        #[doc = "The node's current subnet mask"]
        pub mask: Ipv4Addr,
        #[doc = "The node's current UDP port"]
        pub port: U16Be,
        #[doc = "Bit 6 set when DHCP is enabled"]
        pub status: u8,
        #[doc = "Transmit as zero"]
        pub spare2: u8,
        #[doc = "The node's current default gateway"]
        pub gateway: Ipv4Addr,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 2],
    }
}

impl Default for IpProgReply {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler: [0; 4],
            ip: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            port: U16Be(0x1936),
            status: 0,
            spare2: 0,
            gateway: Ipv4Addr::UNSPECIFIED,
            spare: [0; 2],
        }
    }
}
