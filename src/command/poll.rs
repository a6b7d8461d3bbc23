use crate::convert::OptionalTailU16;
use crate::ArtTalkToMe;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Used to poll the nodes in the network."]
    #[doc = ""]
    #[doc = "Controllers broadcast this at least every 2.5 to 3 seconds. A node answers with one ArtPollReply per port page, delayed by a random 0..1000 ms unless the sender asked for immediate replies."]
    pub struct Poll {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],

        #[doc = "Determines how the nodes should respond"]
        pub talk_to_me: ArtTalkToMe,

        #[doc = "The lowest diagnostics priority the sender wants to receive"]
        pub diagnostics_priority: u8,

        #[doc = "Top of the Port-Address range the sender cares about. Only read when `talk_to_me` has the targeted-mode flag; absent on legacy 14-byte polls and then zero"]
        pub target_port_top: OptionalTailU16,

        #[doc = "Bottom of the Port-Address range the sender cares about"]
        pub target_port_bottom: OptionalTailU16,

        #[doc = "The ESTA manufacturer code of the sender, absent on legacy polls"]
        pub esta: OptionalTailU16,

        #[doc = "The Oem code of the sender, absent on legacy polls"]
        pub oem: OptionalTailU16,
    }
}

impl Default for Poll {
    fn default() -> Poll {
        Poll {
            version: super::ARTNET_PROTOCOL_VERSION,
            talk_to_me: ArtTalkToMe::NONE,
            diagnostics_priority: 0x80,
            target_port_top: OptionalTailU16(0),
            target_port_bottom: OptionalTailU16(0),
            esta: OptionalTailU16(0),
            oem: OptionalTailU16(0),
        }
    }
}

impl Poll {
    /// The targeted-mode range in `low..=high` order, regardless of how the
    /// sender filled the two fields
    pub fn target_range(&self) -> std::ops::RangeInclusive<u16> {
        let a = *self.target_port_bottom;
        let b = *self.target_port_top;
        a.min(b)..=a.max(b)
    }
}
