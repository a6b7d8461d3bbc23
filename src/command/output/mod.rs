#[cfg(test)]
mod tests;

use crate::command::ARTNET_PROTOCOL_VERSION;
use crate::convert::{BigEndianLength, DmxData, SlotData};
use crate::PortAddress;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "ArtDmx is the data packet used to transfer DMX512 data. The format is identical for Node to Controller, Node to Node and Controller to Node."]
    #[doc = ""]
    #[doc = "The Data is output through the DMX O/P port corresponding to the Universe setting. In the absence of received ArtDmx packets, each DMX O/P port re-transmits the same frame continuously."]
    #[doc = ""]
    #[doc = "An input that is active but not changing re-transmits the last valid ArtDmx packet inside the recommended 800 ms to 1000 ms window."]
    pub struct Output {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],
        #[doc = "The sequence number, incremented in the range 0x01 to 0xff so receivers can re-order packets that crossed on the network. 0x00 disables the feature"]
        pub sequence: u8,
        #[doc = "The physical input port from which DMX512 data was input. This field is for information only. Use Universe for data routing"]
        pub physical: u8,
        #[doc = "The 15 bit Port-Address to which this packet is destined"]
        pub port_address: PortAddress,
        #[doc = "The length of the DMX payload, set by the library itself while encoding"]
        pub length: BigEndianLength<Output>,
        #[doc = "A variable length array of DMX512 lighting data"]
        pub data: SlotData,
    }
}

impl DmxData for Output {
    fn dmx_data(&self) -> &SlotData {
        &self.data
    }
}

impl Default for Output {
    fn default() -> Output {
        Output {
            version: ARTNET_PROTOCOL_VERSION,
            sequence: 0,
            physical: 0,
            port_address: 1.into(),
            length: BigEndianLength::default(),
            data: SlotData::default(),
        }
    }
}
