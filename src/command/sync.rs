use crate::ARTNET_PROTOCOL_VERSION;

data_structure! {
    #[derive(Debug, Clone, PartialEq)]
    #[doc = "Forces synchronous transfer of previously received ArtDmx packets to the node's outputs."]
    #[doc = ""]
    #[doc = "A node that has seen an ArtSync buffers incoming frames and releases them together on the next trigger; 4 seconds without one reverts the node to immediate mode. The trigger is broadcast so every buffering node releases on the same datagram."]
    pub struct Sync {
        #[doc = "Determines which version the server has. Will be ARTNET_PROTOCOL_VERSION by default"]
        pub version: [u8; 2],

        #[doc = "Transmit as zero, ignored on receipt. Reserved for future expansion"]
        pub aux: [u8; 2],
    }
}

impl Sync {
    /// A release trigger ready to broadcast
    pub fn trigger() -> Self {
        Self::default()
    }
}

impl Default for Sync {
    fn default() -> Self {
        Self {
            version: ARTNET_PROTOCOL_VERSION,
            aux: [0; 2],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ArtCommand;

    #[test]
    fn the_trigger_is_a_fourteen_byte_datagram() {
        let bytes = ArtCommand::Sync(Sync::trigger()).write_to_buffer().unwrap();
        assert_eq!(
            bytes,
            vec![65, 114, 116, 45, 78, 101, 116, 0, 0, 0x52, 0, 14, 0, 0]
        );
    }

    #[test]
    fn nonzero_aux_bytes_still_decode() {
        // senders must transmit zero, receivers must not care
        let mut datagram = b"Art-Net\0\x00\x52\x00\x0E".to_vec();
        datagram.extend_from_slice(&[0xAB, 0xCD]);
        let decoded = ArtCommand::from_buffer(&datagram).unwrap();
        assert_eq!(decoded.opcode(), 0x5200);
        if let ArtCommand::Sync(sync) = decoded {
            assert_eq!(sync.aux, [0xAB, 0xCD]);
        } else {
            panic!("expected an ArtSync");
        }
    }
}
