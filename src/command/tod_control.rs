use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::Convertable;
use crate::{Error, Result};
use byteorder::{ReadBytesExt, WriteBytesExt};
use std::convert::TryFrom;

/// What an ArtTodControl asks the node's RDM discovery to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TodControlCommand {
    /// No action
    None,
    /// Flush the port's UID cache and run a full discovery
    Flush,
    /// Cancel any discovery running on the port
    End,
    /// Enable incremental background discovery on the port
    IncOn,
    /// Disable incremental background discovery on the port
    IncOff,
    /// Command values this node does not know
    Undefined(u8),
}

impl TryFrom<u8> for TodControlCommand {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x00 => TodControlCommand::None,
            0x01 => TodControlCommand::Flush,
            0x02 => TodControlCommand::End,
            0x03 => TodControlCommand::IncOn,
            0x04 => TodControlCommand::IncOff,
            other => TodControlCommand::Undefined(other),
        })
    }
}

impl From<TodControlCommand> for u8 {
    fn from(command: TodControlCommand) -> u8 {
        match command {
            TodControlCommand::None => 0x00,
            TodControlCommand::Flush => 0x01,
            TodControlCommand::End => 0x02,
            TodControlCommand::IncOn => 0x03,
            TodControlCommand::IncOff => 0x04,
            TodControlCommand::Undefined(other) => other,
        }
    }
}

impl<T> Convertable<T> for TodControlCommand {
    fn from_cursor(cursor: &mut std::io::Cursor<&[u8]>) -> Result<Self> {
        let number = cursor.read_u8().map_err(Error::CursorEof)?;
        TodControlCommand::try_from(number)
    }

    fn write_to_buffer(&self, buffer: &mut Vec<u8>, _context: &T) -> Result<()> {
        buffer.write_u8((*self).into()).map_err(Error::CursorEof)
    }

    #[cfg(test)]
    fn get_test_value() -> Self {
        TodControlCommand::Flush
    }

    #[cfg(test)]
    fn is_equal(&self, other: &Self) -> bool {
        self == other
    }
}

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "RDM discovery control for one port. The node always answers with a snapshot of the port's Table of Devices."]
    pub struct TodControl {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler1: u8,
        #[doc = "Ignore by receiver, set to zero by sender"]
        pub filler2: u8,
        #[doc = "Transmit as zero. For future expansion"]
        pub spare: [u8; 7],
        #[doc = "The top 7 bits of the port's Port-Address"]
        pub net: u8,
        #[doc = "The action to take, see [`TodControlCommand`]"]
        pub command: TodControlCommand,
        #[doc = "The low byte (Sub-Net and Universe) of the port's Port-Address"]
        pub address: u8,
    }
}

impl Default for TodControl {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            filler1: 0,
            filler2: 0,
            spare: [0; 7],
            net: 0,
            command: TodControlCommand::None,
            address: 0,
        }
    }
}

impl TodControl {
    /// The Port-Address this control targets
    pub fn port_address(&self) -> crate::PortAddress {
        crate::PortAddress::compose(self.net, self.address >> 4, self.address & 0x0F)
    }
}
