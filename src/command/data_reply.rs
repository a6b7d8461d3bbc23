use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::{Text, TextLength, TextPayload, U16Be};

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "A node's answer to an ArtDataRequest."]
    pub struct DataReply {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "The ESTA code of the answering node"]
        pub esta: U16Be,
        #[doc = "The Oem code of the answering node"]
        pub oem: U16Be,
        #[doc = "The request code being answered"]
        pub request: U16Be,
        #[doc = "The length of the payload including its null, set by the library while encoding"]
        pub length: TextLength<DataReply>,
        #[doc = "Null terminated ASCII payload"]
        pub payload: Text,
    }
}

impl TextPayload for DataReply {
    fn text(&self) -> &str {
        &self.payload.0
    }
}

impl Default for DataReply {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            esta: U16Be(0),
            oem: U16Be(0xFFFF),
            request: U16Be(0),
            length: TextLength::default(),
            payload: Text::default(),
        }
    }
}
