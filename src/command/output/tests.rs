use super::*;
use crate::ArtCommand;

mod serialization {
    use super::*;

    #[test]
    fn create_single_dmx_value_art_dmx_packet() {
        let command = ArtCommand::Output(Output {
            data: vec![255].into(), // The data we're sending to the node
            ..Output::default()
        });
        let bytes = command.write_to_buffer().unwrap();
        let comparison = vec![
            65, 114, 116, 45, 78, 101, 116, 0, 0, 80, 0, 14, 0, 0, 1, 0, 0, 1, 255,
        ];
        assert_eq!(bytes, comparison)
    }

    #[test]
    fn create_512_dmx_values_art_dmx_packet() {
        let command = ArtCommand::Output(Output {
            data: vec![128; 512].into(),
            ..Output::default()
        });
        let bytes = command.write_to_buffer().unwrap();
        let comparison = [
            vec![
                65, 114, 116, 45, 78, 101, 116, 0, 0, 80, 0, 14, 0, 0, 1, 0, 2, 0,
            ],
            vec![128; 512],
        ]
        .concat();
        assert_eq!(bytes, comparison)
    }

    #[test]
    fn scenario_net1_sub2_universe3() {
        let command = ArtCommand::Output(Output {
            sequence: 1,
            port_address: PortAddress::compose(1, 2, 3),
            data: vec![0xFF, 0x00, 0x80].into(),
            ..Output::default()
        });
        let bytes = command.write_to_buffer().unwrap();
        assert_eq!(
            &bytes[..18],
            &[
                0x41, 0x72, 0x74, 0x2D, 0x4E, 0x65, 0x74, 0x00, // Art-Net\0
                0x00, 0x50, // opcode
                0x00, 0x0E, // protocol version
                0x01, 0x00, // sequence, physical
                0x23, 0x01, // sub-uni, net
                0x00, 0x03, // length
            ]
        );
        assert_eq!(&bytes[18..], &[0xFF, 0x00, 0x80]);

        let decoded = ArtCommand::from_buffer(&bytes).unwrap();
        if let ArtCommand::Output(output) = decoded {
            assert_eq!(u16::from(output.port_address), 291);
            assert_eq!(output.data.as_ref(), &vec![0xFF, 0x00, 0x80]);
        } else {
            panic!("Expected an Output packet");
        }
    }

    #[test]
    fn test_invalid_length() {
        let command = ArtCommand::Output(Output {
            data: vec![0xff; 512].into(),
            ..Output::default()
        });
        let buffer = command.write_to_buffer().unwrap();
        // length needs to be encoded in big endian
        assert_eq!(&buffer[0x10..=0x11], &[2, 0]);

        // packets need to be at least 1 byte
        let command = ArtCommand::Output(Output {
            data: vec![].into(),
            ..Output::default()
        });
        assert!(command.write_to_buffer().is_err());

        // packets need to be at most 512 bytes
        let command = ArtCommand::Output(Output {
            data: vec![0xff; 513].into(),
            ..Output::default()
        });
        assert!(command.write_to_buffer().is_err());
    }
}

mod parsing {
    use super::*;

    #[test]
    fn protver_below_14() {
        // Because Art-Net is guaranteed to be backwards-compatible,
        // we should be able to parse versions below 14,
        // even though these should never be seen in the wild
        let packet = &[
            65, 114, 116, 45, 78, 101, 116, 0, 0, 80, 0, 0, 0, 0, 1, 0, 0, 2, 255, 255,
        ];
        let command = ArtCommand::from_buffer(packet).unwrap();
        if let ArtCommand::Output(output) = command {
            assert_eq!(output.version, [0, 0]);
            assert_eq!(output.sequence, 0);
            assert_eq!(output.physical, 0);
            assert_eq!(output.port_address, 1.into());
            assert_eq!(output.length.parsed(), Some(2));
            assert_eq!(output.data.as_ref(), &vec![255, 255]);
        }
    }

    #[test]
    fn oversized_payload_is_rejected() {
        let packet = [
            vec![65, 114, 116, 45, 78, 101, 116, 0, 0, 80, 0, 14, 0, 0, 1, 0, 2, 1],
            vec![0u8; 513],
        ]
        .concat();
        assert!(ArtCommand::from_buffer(&packet).is_err());
    }

    #[test]
    fn invalid_port_address() {
        // Here Port-Address is 32_768
        // Any Port-Address over 32_767 should fail
        assert!(ArtCommand::from_buffer(
            &[
                vec![65, 114, 116, 45, 78, 101, 116, 0, 0, 80, 0, 14, 0, 0,],
                32_768u16.to_le_bytes().to_vec(),
                vec![0, 2, 255, 255,]
            ]
            .concat()
        )
        .is_err());
    }
}
