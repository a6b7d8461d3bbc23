use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::U16Be;
use std::net::Ipv4Addr;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    /// What an ArtIpProg packet asks the node to reprogram
    pub struct IpProgCommand: u8 {
        /// Any programming is enabled at all; with this bit clear the packet
        /// is a plain query
        const ENABLE = 0b1000_0000;
        /// Enable DHCP; overrides the individual program bits
        const DHCP = 0b0100_0000;
        /// Program the default gateway
        const PROGRAM_GATEWAY = 0b0001_0000;
        /// Return all network parameters to their defaults
        const RESET_TO_DEFAULT = 0b0000_1000;
        /// Program the IP address
        const PROGRAM_IP = 0b0000_0100;
        /// Program the subnet mask
        const PROGRAM_MASK = 0b0000_0010;
        /// Program the UDP port (deprecated)
        const PROGRAM_PORT = 0b0000_0001;
    }
}

impl<T> crate::convert::Convertable<T> for IpProgCommand {
    fn from_cursor(cursor: &mut std::io::Cursor<&[u8]>) -> crate::Result<Self> {
        use byteorder::ReadBytesExt;
        let b = cursor.read_u8().map_err(crate::Error::CursorEof)?;
        Ok(IpProgCommand::from_bits_truncate(b))
    }
    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _: &T) -> crate::Result<()> {
        buffer.push(self.bits());
        Ok(())
    }
    #[cfg(test)]
    fn get_test_value() -> Self {
        IpProgCommand::ENABLE | IpProgCommand::PROGRAM_IP
    }
    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Reprograms the IP, netmask, gateway and DHCP state of a node."]
    pub struct IpProg {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler1: u8,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler2: u8,
        #[doc = "What to program, see [`IpProgCommand`]"]
        pub command: IpProgCommand,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler4: u8,
        #[doc = "IP address to program"]
        pub ip: Ipv4Addr,
        #[doc = "Subnet mask to program"]
        pub mask: Ipv4Addr,
        #[doc = "UDP port to program, deprecated and kept at 0x1936"]
        pub port: U16Be,
        #[doc = "Default gateway to program"]
        pub gateway: Ipv4Addr,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 4],
    }
}

impl Default for IpProg {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler1: 0,
            filler2: 0,
            command: IpProgCommand::empty(),
            filler4: 0,
            ip: Ipv4Addr::UNSPECIFIED,
            mask: Ipv4Addr::UNSPECIFIED,
            port: U16Be(0x1936),
            gateway: Ipv4Addr::UNSPECIFIED,
            spare: [0; 4],
        }
    }
}
