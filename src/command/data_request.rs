use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::U16Be;

/// The well-known ArtDataRequest request codes
pub mod request_code {
    /// Poll for supported request codes
    pub const DR_POLL: u16 = 0x0000;
    /// Request the product URL
    pub const DR_URL_PRODUCT: u16 = 0x0001;
    /// Request the user guide URL
    pub const DR_URL_USER_GUIDE: u16 = 0x0002;
    /// Request the support URL
    pub const DR_URL_SUPPORT: u16 = 0x0003;
    /// Request the UDR personality URL
    pub const DR_URL_PERS_UDR: u16 = 0x0004;
    /// Request the GDTF personality URL
    pub const DR_URL_PERS_GDTF: u16 = 0x0005;
}

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "A controller asking a node for a product detail, typically a URL."]
    pub struct DataRequest {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "The ESTA code of the nodes that shall accept this packet, 0xFFFF for all"]
        pub esta: U16Be,
        #[doc = "The Oem code of the nodes that shall accept this packet, 0xFFFF for all"]
        pub oem: U16Be,
        #[doc = "The detail being requested, see [`request_code`]"]
        pub request: U16Be,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 22],
    }
}

impl Default for DataRequest {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            esta: U16Be(0xFFFF),
            oem: U16Be(0xFFFF),
            request: U16Be(request_code::DR_POLL),
            spare: [0; 22],
        }
    }
}
