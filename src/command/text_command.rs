use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::{Text, TextLength, TextPayload, U16Be};

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Text based parameter directives, formatted as `key=value&key=value`."]
    #[doc = ""]
    #[doc = "A node only acts on the packet when the ESTA code matches its own or is the 0xFFFF wildcard."]
    pub struct Command {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "The ESTA code of the nodes that shall accept this packet, 0xFFFF for all"]
        pub esta: U16Be,
        #[doc = "The length of the text including its null, set by the library while encoding"]
        pub length: TextLength<Command>,
        #[doc = "Null terminated `key=value&key=value` directives"]
        pub data: Text,
    }
}

impl TextPayload for Command {
    fn text(&self) -> &str {
        &self.data.0
    }
}

impl Default for Command {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            esta: U16Be(0xFFFF),
            length: TextLength::default(),
            data: Text::default(),
        }
    }
}

impl Command {
    /// Split the payload into `(key, value)` directives. Empty segments are
    /// skipped, keys are trimmed but not case-folded.
    pub fn directives(&self) -> Vec<(String, String)> {
        self.data
            .0
            .split('&')
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_owned(), value.to_owned()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directives_split_on_ampersands() {
        let command = Command {
            data: Text("SwoutText=Stage left&SwinText=Desk".into()),
            ..Command::default()
        };
        assert_eq!(
            command.directives(),
            vec![
                ("SwoutText".to_owned(), "Stage left".to_owned()),
                ("SwinText".to_owned(), "Desk".to_owned()),
            ]
        );
    }

    #[test]
    fn malformed_segments_are_skipped() {
        let command = Command {
            data: Text("NoEquals&=value&Key=ok".into()),
            ..Command::default()
        };
        assert_eq!(
            command.directives(),
            vec![("Key".to_owned(), "ok".to_owned())]
        );
    }
}
