use crate::command::ARTNET_PROTOCOL_VERSION;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "A packet whose field layout this crate does not interpret."]
    #[doc = ""]
    #[doc = "The video, media, mac and file opcode families are undocumented or deprecated; their bodies are carried opaquely so the application can still see and re-emit them."]
    pub struct GenericPacket {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Everything after the protocol version, as raw bytes"]
        pub payload: Vec<u8>,
    }
}

impl Default for GenericPacket {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            payload: Vec::new(),
        }
    }
}
