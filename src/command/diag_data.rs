use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::{Text, TextLength, TextPayload};

/// The diagnostics priority ladder, low to volatile
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum DiagPriority {
    /// Low priority messages
    Low = 0x10,
    /// Medium priority messages
    Med = 0x40,
    /// High priority messages
    High = 0x80,
    /// Critical priority messages
    Critical = 0xE0,
    /// Volatile messages, displayed on a single line on the controller
    Volatile = 0xF0,
}

impl DiagPriority {
    /// Normalize an arbitrary wire byte onto the ladder, rounding down
    pub fn normalize(value: u8) -> DiagPriority {
        match value {
            0..=0x3F => DiagPriority::Low,
            0x40..=0x7F => DiagPriority::Med,
            0x80..=0xDF => DiagPriority::High,
            0xE0..=0xEF => DiagPriority::Critical,
            _ => DiagPriority::Volatile,
        }
    }
}

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "A textual diagnostics message. Nodes send these to subscribed controllers, broadcast or unicast depending on how the subscriber polled."]
    pub struct DiagData {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler1: u8,
        #[doc = "The priority of this message, see [`DiagPriority`]"]
        pub diag_priority: u8,
        #[doc = "The logical port the message concerns, 0 for the node itself"]
        pub logical_port: u8,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler3: u8,
        #[doc = "The length of the text including its null, set by the library while encoding"]
        pub length: TextLength<DiagData>,
        #[doc = "Null terminated ASCII text"]
        pub data: Text,
    }
}

impl TextPayload for DiagData {
    fn text(&self) -> &str {
        &self.data.0
    }
}

impl Default for DiagData {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler1: 0,
            diag_priority: DiagPriority::Low as u8,
            logical_port: 0,
            filler3: 0,
            length: TextLength::default(),
            data: Text::default(),
        }
    }
}
