//! End-to-end scenarios through the public API: wire bytes in, node state
//! machine, effects out.

use artnet_node::node::{
    Config, Effect, Event, Node, NodeCommand, NodeEvent, StatePatch,
};
use artnet_node::node::config::{DiscoveryConfig, PageConfig, PortConfig};
use artnet_node::node::discovery::ReplyOnChangePolicy;
use artnet_node::{ArtCommand, ArtTalkToMe, PortAddress, Poll};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

fn controller(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last_octet], 6454))
}

fn node_on(net: u8, sub_net: u8, universe: u8) -> Node {
    let config = Config {
        pages: vec![PageConfig {
            net,
            sub_net,
            ports: vec![PortConfig {
                universe,
                ..PortConfig::default()
            }],
        }],
        ..Config::default()
    };
    let (mut node, _) = Node::new(config).unwrap();
    node.set_delay_source(Box::new(|| 0));
    node
}

fn rx(node: &mut Node, bytes: &[u8], sender: SocketAddr, at: Instant) -> Vec<Effect> {
    let command = ArtCommand::from_buffer(bytes).expect("test datagram should decode");
    node.step(Event::Packet {
        command,
        sender,
        at,
    })
}

#[test]
fn artdmx_wire_roundtrip_drives_the_node() {
    // the literal ArtDmx bytes for sequence 1, port-address 1:2:3,
    // data [0xFF, 0x00, 0x80]
    let datagram: Vec<u8> = vec![
        0x41, 0x72, 0x74, 0x2D, 0x4E, 0x65, 0x74, 0x00, // Art-Net\0
        0x00, 0x50, // ArtDmx
        0x00, 0x0E, // protocol 14
        0x01, 0x00, // sequence, physical
        0x23, 0x01, // sub-uni, net -> 291
        0x00, 0x03, // length
        0xFF, 0x00, 0x80,
    ];

    let decoded = ArtCommand::from_buffer(&datagram).unwrap();
    if let ArtCommand::Output(output) = &decoded {
        assert_eq!(u16::from(output.port_address), 291);
    } else {
        panic!("expected ArtDmx");
    }
    // and the encoder produces the same bytes back
    assert_eq!(decoded.write_to_buffer().unwrap(), datagram);

    let mut node = node_on(1, 2, 3);
    let effects = rx(&mut node, &datagram, controller(1), Instant::now());
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::DmxFrame { port_address, data, .. }
            if u16::from(*port_address) == 291 && data == &vec![0xFF, 0x00, 0x80]
    )));
}

#[test]
fn two_controllers_merge_htp_on_the_wire() {
    let mut node = node_on(0, 0, 1);
    let port = PortAddress::compose(0, 0, 1);
    let t0 = Instant::now();

    let frame = |data: Vec<u8>| {
        ArtCommand::Output(artnet_node::Output {
            port_address: port,
            data: data.into(),
            ..artnet_node::Output::default()
        })
        .write_to_buffer()
        .unwrap()
    };

    rx(&mut node, &frame(vec![100, 0, 50]), controller(1), t0);
    let effects = rx(
        &mut node,
        &frame(vec![0, 100, 200]),
        controller(2),
        t0 + Duration::from_millis(20),
    );

    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Dmx { data, merged: true, .. })
            if data == &vec![100, 100, 200]
    )));
}

#[test]
fn reply_on_change_limit_demotes_by_policy() {
    let config = Config {
        discovery: DiscoveryConfig {
            reply_on_change_limit: 2,
            reply_on_change_policy: ReplyOnChangePolicy::PreferExisting,
        },
        ..Config::default()
    };
    let (mut node, _) = Node::new(config).unwrap();
    node.set_delay_source(Box::new(|| 0));

    let subscribe = ArtCommand::Poll(Poll {
        talk_to_me: ArtTalkToMe::REPLY_ON_CHANGE | ArtTalkToMe::SUPPRESS_REPLY_DELAY,
        ..Poll::default()
    })
    .write_to_buffer()
    .unwrap();

    let t0 = Instant::now();
    rx(&mut node, &subscribe, controller(1), t0 + Duration::from_millis(100));
    rx(&mut node, &subscribe, controller(2), t0 + Duration::from_millis(200));
    rx(&mut node, &subscribe, controller(3), t0 + Duration::from_millis(300));

    // a state change now fans out to exactly the two oldest grants
    let effects = node.step(Event::Command {
        command: NodeCommand::ApplyState(StatePatch {
            short_name: Some("renamed".to_owned()),
            ..StatePatch::default()
        }),
        at: t0 + Duration::from_millis(400),
    });
    let mut targets: Vec<SocketAddr> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Tx { command, target } if command.opcode() == 0x2100 => Some(*target),
            _ => None,
        })
        .collect();
    targets.sort();
    targets.dedup();
    assert_eq!(targets, vec![controller(1), controller(2)]);
}

#[test]
fn garbage_datagrams_never_panic() {
    let samples: Vec<Vec<u8>> = vec![
        vec![],
        vec![0x41],
        b"Art-Net\0".to_vec(),
        b"Art-Net\0\xFF\xFF".to_vec(),
        vec![0u8; 1024],
        (0..=255u8).collect(),
    ];
    for sample in samples {
        // decode either succeeds or returns a structured error
        let _ = ArtCommand::from_buffer(&sample);
    }
}

#[test]
fn compose_split_inverse_across_the_whole_domain() {
    for net in 0..=127u8 {
        for sub_net in 0..=15u8 {
            for universe in 0..=15u8 {
                let address = PortAddress::compose(net, sub_net, universe);
                assert_eq!(address.split(), (net, sub_net, universe));
                assert!(u16::from(address) <= 32_767);
            }
        }
    }
}

#[test]
fn port_address_32768_is_refused() {
    assert!(PortAddress::try_from(32_768u16).is_err());
    assert!(PortAddress::try_from(32_767u16).is_ok());
}

#[test]
fn targeted_poll_against_multiple_pages() {
    // pages subscribing 1, 100 and 500
    let config = Config {
        pages: vec![
            PageConfig {
                net: 0,
                sub_net: 0,
                ports: vec![PortConfig {
                    universe: 1,
                    ..PortConfig::default()
                }],
            },
            PageConfig {
                net: 0,
                sub_net: 6,
                ports: vec![PortConfig {
                    universe: 4, // 0x064 = 100
                    ..PortConfig::default()
                }],
            },
            PageConfig {
                net: 1,
                sub_net: 15,
                ports: vec![PortConfig {
                    universe: 4, // 0x1F4 = 500
                    ..PortConfig::default()
                }],
            },
        ],
        ..Config::default()
    };
    let (mut node, _) = Node::new(config).unwrap();
    node.set_delay_source(Box::new(|| 0));

    let targeted = |bottom: u16, top: u16| {
        let mut poll = Poll::default();
        poll.talk_to_me = ArtTalkToMe::TARGETED_MODE | ArtTalkToMe::SUPPRESS_REPLY_DELAY;
        poll.target_port_bottom = artnet_node::convert::OptionalTailU16(bottom);
        poll.target_port_top = artnet_node::convert::OptionalTailU16(top);
        ArtCommand::Poll(poll).write_to_buffer().unwrap()
    };

    // [50, 200] intersects only the page carrying 100
    let effects = rx(&mut node, &targeted(50, 200), controller(1), Instant::now());
    let replies: Vec<u8> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Tx { command: ArtCommand::PollReply(reply), .. } => Some(reply.bind_index),
            _ => None,
        })
        .collect();
    assert_eq!(replies, vec![2]);

    // [101, 499] intersects nothing
    let effects = rx(&mut node, &targeted(101, 499), controller(1), Instant::now());
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::Tx { .. })));

    // an untargeted poll answers with every page
    let untargeted = ArtCommand::Poll(Poll {
        talk_to_me: ArtTalkToMe::SUPPRESS_REPLY_DELAY,
        ..Poll::default()
    })
    .write_to_buffer()
    .unwrap();
    let effects = rx(&mut node, &untargeted, controller(1), Instant::now());
    assert_eq!(
        effects
            .iter()
            .filter(|effect| matches!(effect, Effect::Tx { .. }))
            .count(),
        3
    );
}

#[test]
fn firmware_upload_over_the_wire_ends_all_good() {
    use artnet_node::{AlignedData, BlockType, FirmwareMaster, FirmwareReplyStatus};
    use byteorder::{BigEndian, ByteOrder};

    let payload = [0x12u8, 0x34, 0x56, 0x78];
    let mut image = vec![0u8; 1060];
    let checksum = !payload
        .iter()
        .fold(0u16, |acc, &b| acc.wrapping_add(b as u16));
    BigEndian::write_u16(&mut image[..2], checksum);
    BigEndian::write_u32(&mut image[1056..1060], (payload.len() / 2) as u32);
    image.extend_from_slice(&payload);
    let words = (image.len() / 2) as u32;

    let mut node = node_on(0, 0, 1);
    let chunks: Vec<&[u8]> = image.chunks(1024).collect();
    let t0 = Instant::now();
    let mut last_status = None;
    for (index, chunk) in chunks.iter().enumerate() {
        let block_type = if index == 0 {
            BlockType::FirmFirst
        } else if index == chunks.len() - 1 {
            BlockType::FirmLast
        } else {
            BlockType::FirmCont
        };
        let packet = ArtCommand::FirmwareMaster(Box::new(FirmwareMaster {
            block_type,
            block_id: index as u8,
            firmware_length: artnet_node::convert::U32Be(words),
            data: AlignedData(chunk.to_vec()),
            ..FirmwareMaster::default()
        }))
        .write_to_buffer()
        .unwrap();

        let effects = rx(&mut node, &packet, controller(9), t0);
        last_status = effects.iter().find_map(|effect| match effect {
            Effect::Tx { command: ArtCommand::FirmwareReply(reply), .. } => Some(reply.status),
            _ => None,
        });
    }
    assert_eq!(last_status, Some(FirmwareReplyStatus::AllGood));
}

#[test]
fn nzs_with_dmx_start_code_is_a_decode_error() {
    // ArtNzs carrying start code 0x00 must not decode
    let mut datagram = b"Art-Net\0\x00\x51\x00\x0E".to_vec();
    datagram.extend_from_slice(&[1, 0x00, 0x01, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
    assert!(ArtCommand::from_buffer(&datagram).is_err());

    // 0xCC (RDM) is equally refused
    let mut datagram = b"Art-Net\0\x00\x51\x00\x0E".to_vec();
    datagram.extend_from_slice(&[1, 0xCC, 0x01, 0x00, 0x00, 0x02, 0xAA, 0xBB]);
    assert!(ArtCommand::from_buffer(&datagram).is_err());
}
