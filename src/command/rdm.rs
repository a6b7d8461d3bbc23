use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::{Error, Result};
use std::convert::TryFrom;

/// The shortest RDM payload the node accepts
pub const RDM_MIN_PAYLOAD: usize = 24;

/// The longest RDM payload the node accepts
pub const RDM_MAX_PAYLOAD: usize = 255;

/// Offset of the command-class byte inside the RDM payload
pub const RDM_COMMAND_CLASS_OFFSET: usize = 20;

/// The four RDM command classes Art-Net transports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RdmCommandClass {
    /// GET a parameter
    Get = 0x20,
    /// Response to a GET
    GetResponse = 0x21,
    /// SET a parameter
    Set = 0x30,
    /// Response to a SET
    SetResponse = 0x31,
}

impl TryFrom<u8> for RdmCommandClass {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0x20 => Ok(RdmCommandClass::Get),
            0x21 => Ok(RdmCommandClass::GetResponse),
            0x30 => Ok(RdmCommandClass::Set),
            0x31 => Ok(RdmCommandClass::SetResponse),
            other => Err(Error::InvalidRdmCommandClass(other)),
        }
    }
}

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "A non-discovery RDM message in transit between a controller and a port."]
    pub struct Rdm {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "The RDM standard supported, 0x01 for V1.0"]
        pub rdm_version: u8,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler2: u8,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 7],
        #[doc = "The top 7 bits of the destination Port-Address"]
        pub net: u8,
        #[doc = "0x00 ArProcess is the only defined command"]
        pub command: u8,
        #[doc = "The low byte (Sub-Net and Universe) of the destination Port-Address"]
        pub address: u8,
        #[doc = "The RDM message itself, without the 0xCC start code"]
        pub data: Vec<u8>,
    }
}

impl Default for Rdm {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            rdm_version: 1,
            filler2: 0,
            spare: [0; 7],
            net: 0,
            command: 0,
            address: 0,
            data: Vec::new(),
        }
    }
}

impl Rdm {
    /// The Port-Address this message is destined for
    pub fn port_address(&self) -> crate::PortAddress {
        crate::PortAddress::compose(self.net, self.address >> 4, self.address & 0x0F)
    }

    /// Validate the payload size and pull out its command class.
    ///
    /// Payloads shorter than 24 or longer than 255 bytes are rejected, as is
    /// any command class outside GET/GET_RESPONSE/SET/SET_RESPONSE.
    pub fn command_class(&self) -> Result<RdmCommandClass> {
        if self.data.len() < RDM_MIN_PAYLOAD {
            return Err(Error::MessageTooShort {
                message: self.data.clone(),
                min_len: RDM_MIN_PAYLOAD,
            });
        }
        if self.data.len() > RDM_MAX_PAYLOAD {
            return Err(Error::MessageSizeInvalid {
                message: self.data.clone(),
                allowed_size: RDM_MIN_PAYLOAD..RDM_MAX_PAYLOAD + 1,
            });
        }
        RdmCommandClass::try_from(self.data[RDM_COMMAND_CLASS_OFFSET])
    }
}
