use crate::convert::{FixedString, U16Be, Uid};
use std::net::Ipv4Addr;

data_structure! {
    #[derive(Clone, PartialEq)]
    #[doc = "Gets sent by the nodes in the network as a response to the Poll message, and unsolicited on state change when a controller subscribed with the reply-on-change flag."]
    #[doc = ""]
    #[doc = "A node with more than 4 ports sends one reply per port page, with distinct `bind_index` values counting up from 1."]
    pub struct PollReply {
        #[doc = "The IP address of the node"]
        pub address: Ipv4Addr,
        #[doc = "The port of the node, should always be 0x1936 / 6454. The only little-endian field outside the opcode"]
        pub port: u16,
        #[doc = "The node's firmware revision number"]
        pub version: [u8; 2],
        #[doc = "Bits 14-8 of the 15 bit Port-Address, in the bottom 7 bits of this byte"]
        pub net_switch: u8,
        #[doc = "Bits 7-4 of the 15 bit Port-Address, in the bottom 4 bits of this byte"]
        pub sub_switch: u8,
        #[doc = "The Oem word describes the equipment vendor and the feature set available"]
        pub oem: U16Be,
        #[doc = "Firmware version of the User Bios Extension Area. Zero if not programmed"]
        pub ubea_version: u8,
        #[doc = "General status register, see [`Status1`](crate::Status1)"]
        pub status_1: u8,
        #[doc = "The ESTA manufacturer code, transmitted lo-hi"]
        pub esta_code: u16,
        #[doc = "Null terminated short name for the Node, programmed via ArtAddress. 17 characters plus the null"]
        pub short_name: FixedString<18>,
        #[doc = "Null terminated long name for the Node, programmed via ArtAddress. 63 characters plus the null"]
        pub long_name: FixedString<64>,
        #[doc = "Textual report of the Node's operating status, formatted as \"#xxxx [yyyy] zzzzz..\" where xxxx is a hex status code and yyyy counts the replies this node has sent"]
        pub node_report: FixedString<64>,
        #[doc = "The number of input or output ports, at most 4 per page"]
        pub num_ports: U16Be,
        #[doc = "Operation and protocol of each channel, see [`PortType`](crate::PortType)"]
        pub port_types: [u8; 4],
        #[doc = "Input status per port, see [`GoodInput`](crate::GoodInput)"]
        pub good_input: [u8; 4],
        #[doc = "Output status per port, see [`GoodOutputA`](crate::GoodOutputA)"]
        pub good_output: [u8; 4],
        #[doc = "Bits 3-0 of the Port-Address of each input port, in the low nibble"]
        pub swin: [u8; 4],
        #[doc = "Bits 3-0 of the Port-Address of each output port, in the low nibble"]
        pub swout: [u8; 4],
        #[doc = "The sACN priority this node transmits with when ports are switched to sACN"]
        pub acn_priority: u8,
        #[doc = "Trigger values for nodes that support macro key inputs"]
        pub sw_macro: u8,
        #[doc = "Trigger values for nodes that support remote trigger inputs"]
        pub sw_remote: u8,
        #[doc(hidden)]
        pub spare: [u8; 3],
        #[doc = "The Style code defines the equipment style of the device"]
        pub style: u8,
        #[doc = "MAC Address. Set to zero if node cannot supply this information"]
        pub mac: [u8; 6],
        #[doc = "If this unit is part of a larger or modular product, this is the IP of the root device"]
        pub bind_ip: Ipv4Addr,
        #[doc = "The order of bound devices, counting up from 1 at the root device"]
        pub bind_index: u8,
        #[doc = "Extended status register, see [`Status2`](crate::Status2)"]
        pub status_2: u8,
        #[doc = "Output status per port for the second protocol, bit 7 set when the port outputs sACN"]
        pub good_output_b: [u8; 4],
        #[doc = "Third status register, see [`Status3`](crate::Status3); the top two bits carry the failsafe mode"]
        pub status_3: u8,
        #[doc = "The RDM UID this node answers LLRP with. Zero when unsupported"]
        pub default_resp_uid: Uid,
        #[doc = "Available for user-specific data"]
        pub user: U16Be,
        #[doc = "Maximum refresh rate in Hz the node can output DMX at; zero means the DMX512 standard 44 Hz"]
        pub refresh_rate: U16Be,
        #[doc = "The RDM background queue policy currently in effect"]
        pub background_queue_policy: u8,
        #[doc = "Transmit as zero. For future expansion"]
        pub filler: [u8; 10],
    }
}

impl std::fmt::Debug for PollReply {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        fmt.debug_struct("PollReply")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("version", &self.version)
            .field("net_switch", &self.net_switch)
            .field("sub_switch", &self.sub_switch)
            .field("oem", &self.oem)
            .field("status_1", &self.status_1)
            .field("esta_code", &self.esta_code)
            .field("short_name", &self.short_name.0)
            .field("long_name", &self.long_name.0)
            .field("node_report", &self.node_report.0)
            .field("num_ports", &self.num_ports)
            .field("port_types", &self.port_types)
            .field("good_input", &self.good_input)
            .field("good_output", &self.good_output)
            .field("swin", &self.swin)
            .field("swout", &self.swout)
            .field("style", &self.style)
            .field("mac", &self.mac)
            .field("bind_ip", &self.bind_ip)
            .field("bind_index", &self.bind_index)
            .field("status_2", &self.status_2)
            .field("good_output_b", &self.good_output_b)
            .field("status_3", &self.status_3)
            .field("background_queue_policy", &self.background_queue_policy)
            .finish()
    }
}

impl Default for PollReply {
    fn default() -> Self {
        // Per Art-Net spec, unused fields are zero
        PollReply {
            address: Ipv4Addr::UNSPECIFIED,
            port: 6454,
            version: [0; 2],
            net_switch: 0,
            sub_switch: 0,
            oem: U16Be(0),
            ubea_version: 0,
            status_1: 0,
            esta_code: 0,
            short_name: FixedString::default(),
            long_name: FixedString::default(),
            node_report: FixedString::default(),
            num_ports: U16Be(0),
            port_types: [0; 4],
            good_input: [0; 4],
            good_output: [0; 4],
            swin: [0; 4],
            swout: [0; 4],
            acn_priority: 0,
            sw_macro: 0,
            sw_remote: 0,
            spare: [0; 3],
            style: 0,
            mac: [0; 6],
            bind_ip: Ipv4Addr::UNSPECIFIED,
            bind_index: 1,
            status_2: 0,
            good_output_b: [0; 4],
            status_3: 0,
            default_resp_uid: Uid::default(),
            user: U16Be(0),
            refresh_rate: U16Be(0),
            background_queue_policy: 0,
            filler: [0; 10],
        }
    }
}
