use crate::command::rdm::RdmCommandClass;
use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::{U16Be, Uid};

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Compressed RDM sub-device data, carrying one parameter across a contiguous range of sub-devices."]
    #[doc = ""]
    #[doc = "GET and SET_RESPONSE carry no payload; GET_RESPONSE and SET carry one 16-bit word per sub-device."]
    pub struct RdmSub {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "The RDM standard supported, 0x01 for V1.0"]
        pub rdm_version: u8,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler2: u8,
        #[doc = "The UID of the device being addressed"]
        pub uid: Uid,
        #[doc = "Transmit as zero"]
        pub spare1: u8,
        #[doc = "The RDM command class, one of GET/GET_RESPONSE/SET/SET_RESPONSE"]
        pub command_class: u8,
        #[doc = "The RDM parameter being accessed"]
        pub parameter_id: U16Be,
        #[doc = "The first sub-device of the range, 1-based; 0 is the root device"]
        pub sub_device: U16Be,
        #[doc = "How many sub-devices the range covers, must be at least 1"]
        pub sub_count: U16Be,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 4],
        #[doc = "One 16-bit word per sub-device for GET_RESPONSE and SET, empty otherwise"]
        pub data: Vec<u8>,
    }
}

impl Default for RdmSub {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            rdm_version: 1,
            filler2: 0,
            uid: Uid::default(),
            spare1: 0,
            command_class: RdmCommandClass::Get as u8,
            parameter_id: U16Be(0),
            sub_device: U16Be(0),
            sub_count: U16Be(1),
            spare: [0; 4],
            data: Vec::new(),
        }
    }
}

impl RdmSub {
    /// The payload size the command class requires for this packet's range
    pub fn expected_payload_len(&self) -> Option<usize> {
        let class = RdmCommandClass::try_from(self.command_class).ok()?;
        Some(match class {
            RdmCommandClass::Get | RdmCommandClass::SetResponse => 0,
            RdmCommandClass::GetResponse | RdmCommandClass::Set => 2 * *self.sub_count as usize,
        })
    }

    /// The sub-device range this packet covers, wrapping modulo 2^16
    pub fn sub_device_range(&self) -> impl Iterator<Item = u16> {
        let start = *self.sub_device;
        (0..*self.sub_count).map(move |offset| start.wrapping_add(offset))
    }
}
