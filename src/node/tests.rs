use super::*;
use crate::command::{Address, Command, IpProg, IpProgCommand, Output, Poll, TodRequest, Trigger};
use crate::convert::{OptionalTailU16, Text, Uid};
use crate::{ArtCommand, ArtTalkToMe, GoodOutputA, PortAddress, IP_PROG_STATUS_DHCP};
use super::config::{PageConfig, PortConfig};
use super::failsafe::FailsafeMode;
use super::merge::MergeMode;
use super::sync::SyncMode;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

fn controller(last_octet: u8) -> SocketAddr {
    SocketAddr::from(([10, 0, 0, last_octet], 6454))
}

fn test_config() -> Config {
    Config {
        pages: vec![PageConfig {
            net: 1,
            sub_net: 2,
            ports: vec![PortConfig {
                universe: 3,
                ..PortConfig::default()
            }],
        }],
        ..Config::default()
    }
}

fn test_node(config: Config) -> Node {
    let (mut node, _) = Node::new(config).unwrap();
    node.set_delay_source(Box::new(|| 0));
    node
}

fn dmx_packet(port: PortAddress, data: Vec<u8>) -> ArtCommand {
    ArtCommand::Output(Output {
        sequence: 1,
        port_address: port,
        data: data.into(),
        ..Output::default()
    })
}

fn packet_event(command: ArtCommand, sender: SocketAddr, at: Instant) -> Event {
    Event::Packet {
        command,
        sender,
        at,
    }
}

fn dmx_frames(effects: &[Effect]) -> Vec<(PortAddress, Vec<u8>)> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::DmxFrame {
                port_address, data, ..
            } => Some((*port_address, data.clone())),
            _ => None,
        })
        .collect()
}

fn tx_opcodes(effects: &[Effect]) -> Vec<u16> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Tx { command, .. } => Some(command.opcode()),
            _ => None,
        })
        .collect()
}

#[test]
fn dmx_ingress_outputs_and_calls_back() {
    let mut node = test_node(test_config());
    let port = PortAddress::compose(1, 2, 3);
    let t0 = Instant::now();

    let effects = node.step(packet_event(
        dmx_packet(port, vec![0xFF, 0x00, 0x80]),
        controller(1),
        t0,
    ));

    assert_eq!(dmx_frames(&effects), vec![(port, vec![0xFF, 0x00, 0x80])]);
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Dmx { port_address, merged: false, synced: false, .. })
            if *port_address == port
    )));
}

#[test]
fn htp_merge_scenario() {
    let mut node = test_node(test_config());
    let port = PortAddress::compose(1, 2, 3);
    let t0 = Instant::now();

    node.step(packet_event(
        dmx_packet(port, vec![100, 0, 50]),
        controller(1),
        t0,
    ));
    let effects = node.step(packet_event(
        dmx_packet(port, vec![0, 100, 200]),
        controller(2),
        t0 + Duration::from_millis(10),
    ));

    assert_eq!(dmx_frames(&effects), vec![(port, vec![100, 100, 200])]);

    // the poll reply now carries the merging bit for that port
    let reply = node.build_poll_reply(0);
    assert_ne!(reply.good_output[0] & GoodOutputA::MERGING.bits(), 0);
}

#[test]
fn third_source_is_held_off() {
    let mut node = test_node(test_config());
    let port = PortAddress::compose(1, 2, 3);
    let t0 = Instant::now();

    node.step(packet_event(dmx_packet(port, vec![1]), controller(1), t0));
    node.step(packet_event(dmx_packet(port, vec![2]), controller(2), t0));
    let effects = node.step(packet_event(dmx_packet(port, vec![3]), controller(3), t0));

    assert!(dmx_frames(&effects).is_empty());
}

#[test]
fn sync_stages_and_releases_in_order() {
    let mut node = test_node(Config {
        sync: config::SyncConfig {
            mode: SyncMode::ArtSync,
            buffer_ttl_ms: 1000,
        },
        ..test_config()
    });
    let port = PortAddress::compose(1, 2, 3);
    let t0 = Instant::now();

    // staged, no output yet
    let effects = node.step(packet_event(
        dmx_packet(port, vec![1, 2]),
        controller(1),
        t0,
    ));
    assert!(dmx_frames(&effects).is_empty());

    let effects = node.step(packet_event(
        ArtCommand::Sync(crate::command::Sync::default()),
        controller(1),
        t0 + Duration::from_millis(5),
    ));
    assert_eq!(dmx_frames(&effects), vec![(port, vec![1, 2])]);
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Sync { released: 1, ignored: None, .. })
    )));
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Dmx { synced: true, .. })
    )));
}

#[test]
fn sync_from_a_foreign_sender_is_ignored() {
    let mut node = test_node(Config {
        sync: config::SyncConfig {
            mode: SyncMode::ArtSync,
            buffer_ttl_ms: 1000,
        },
        ..test_config()
    });
    let port = PortAddress::compose(1, 2, 3);
    let t0 = Instant::now();

    node.step(packet_event(dmx_packet(port, vec![1, 2]), controller(1), t0));
    let effects = node.step(packet_event(
        ArtCommand::Sync(crate::command::Sync::default()),
        controller(2),
        t0 + Duration::from_millis(5),
    ));

    assert!(dmx_frames(&effects).is_empty());
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Sync {
            released: 0,
            ignored: Some(SyncIgnoreReason::SenderMismatch),
            ..
        })
    )));
}

#[test]
fn sync_when_not_configured_is_ignored() {
    let mut node = test_node(test_config());
    let effects = node.step(packet_event(
        ArtCommand::Sync(crate::command::Sync::default()),
        controller(1),
        Instant::now(),
    ));
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Sync {
            ignored: Some(SyncIgnoreReason::NotConfigured),
            ..
        })
    )));
}

#[test]
fn failsafe_zero_scenario() {
    let mut node = test_node(Config {
        failsafe: config::FailsafeConfig {
            enabled: true,
            mode: FailsafeMode::Zero,
            idle_timeout_ms: 6000,
            tick_interval_ms: 100,
        },
        ..test_config()
    });
    let port = PortAddress::compose(1, 2, 3);
    let t0 = Instant::now();

    node.step(packet_event(
        dmx_packet(port, vec![10, 20, 30]),
        controller(1),
        t0,
    ));

    let effects = node.step(Event::Tick {
        at: t0 + Duration::from_millis(6001),
    });
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::DmxFrame { port_address, data, .. }
            if *port_address == port && data == &vec![0, 0, 0]
    )));
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Dmx {
            failsafe: Some(FailsafeMode::Zero),
            sender: None,
            ..
        })
    )));

    // live data disengages and logs
    let effects = node.step(packet_event(
        dmx_packet(port, vec![5, 5, 5]),
        controller(1),
        t0 + Duration::from_millis(6100),
    ));
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Log { level: LogLevel::Info, message } if message.contains("disengaged")
    )));
}

#[test]
fn poll_answers_immediately_without_delay() {
    let mut node = test_node(test_config());
    let effects = node.step(packet_event(
        ArtCommand::Poll(Poll::default()),
        controller(1),
        Instant::now(),
    ));
    assert_eq!(tx_opcodes(&effects), vec![0x2100]);
}

#[test]
fn poll_schedules_a_delayed_reply_when_the_source_says_so() {
    let mut node = test_node(test_config());
    node.set_delay_source(Box::new(|| 500));
    let t0 = Instant::now();

    let effects = node.step(packet_event(
        ArtCommand::Poll(Poll::default()),
        controller(1),
        t0,
    ));
    assert!(tx_opcodes(&effects).is_empty());
    let scheduled = effects.iter().find_map(|effect| match effect {
        Effect::Schedule { delay, action } => Some((*delay, action.clone())),
        _ => None,
    });
    let (delay, action) = scheduled.expect("a reply should have been scheduled");
    assert_eq!(delay, Duration::from_millis(500));

    // firing the schedule produces the reply
    let effects = node.step(Event::Scheduled {
        action,
        at: t0 + delay,
    });
    assert_eq!(tx_opcodes(&effects), vec![0x2100]);
}

#[test]
fn suppress_delay_flag_short_circuits_the_delay() {
    let mut node = test_node(test_config());
    node.set_delay_source(Box::new(|| 500));
    let effects = node.step(packet_event(
        ArtCommand::Poll(Poll {
            talk_to_me: ArtTalkToMe::SUPPRESS_REPLY_DELAY,
            ..Poll::default()
        }),
        controller(1),
        Instant::now(),
    ));
    assert_eq!(tx_opcodes(&effects), vec![0x2100]);
}

#[test]
fn targeted_poll_filters_by_port_address_range() {
    // the node's only page subscribes Port-Address 291 (1:2:3)
    let mut node = test_node(test_config());

    let poll_in_range = Poll {
        talk_to_me: ArtTalkToMe::TARGETED_MODE | ArtTalkToMe::SUPPRESS_REPLY_DELAY,
        target_port_bottom: OptionalTailU16(200),
        target_port_top: OptionalTailU16(300),
        ..Poll::default()
    };
    let effects = node.step(packet_event(
        ArtCommand::Poll(poll_in_range),
        controller(1),
        Instant::now(),
    ));
    assert_eq!(tx_opcodes(&effects), vec![0x2100]);

    let poll_out_of_range = Poll {
        talk_to_me: ArtTalkToMe::TARGETED_MODE | ArtTalkToMe::SUPPRESS_REPLY_DELAY,
        target_port_bottom: OptionalTailU16(0),
        target_port_top: OptionalTailU16(50),
        ..Poll::default()
    };
    let effects = node.step(packet_event(
        ArtCommand::Poll(poll_out_of_range),
        controller(1),
        Instant::now(),
    ));
    assert!(tx_opcodes(&effects).is_empty());
}

#[test]
fn address_command_acks_and_reflects_state() {
    let mut node = test_node(test_config());
    let t0 = Instant::now();

    // subscribe the controller to diagnostics first
    node.step(packet_event(
        ArtCommand::Poll(Poll {
            talk_to_me: ArtTalkToMe::ENABLE_DIAGNOSTICS | ArtTalkToMe::UNICAST_DIAGNOSTICS,
            ..Poll::default()
        }),
        controller(1),
        t0,
    ));

    let effects = node.step(packet_event(
        ArtCommand::Address(Box::new(Address {
            command: 0x10, // LTP on port 0
            ..Address::default()
        })),
        controller(1),
        t0 + Duration::from_millis(1),
    ));

    // an ack diagnostic plus the refreshed poll reply
    let opcodes = tx_opcodes(&effects);
    assert!(opcodes.contains(&0x2300));
    assert!(opcodes.contains(&0x2100));
    assert_eq!(node.pages()[0].ports[0].merge_mode, MergeMode::Ltp);
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Address { command: Some(info), .. }) if info.applied
    )));
}

#[test]
fn address_reply_fans_out_to_reply_on_change_peers() {
    let mut node = test_node(test_config());
    let t0 = Instant::now();
    node.step(packet_event(
        ArtCommand::Poll(Poll {
            talk_to_me: ArtTalkToMe::REPLY_ON_CHANGE,
            ..Poll::default()
        }),
        controller(7),
        t0,
    ));

    let effects = node.step(packet_event(
        ArtCommand::Address(Box::new(Address {
            command: 0x02,
            ..Address::default()
        })),
        controller(1),
        t0 + Duration::from_millis(1),
    ));

    let reply_targets: Vec<SocketAddr> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Tx { command, target } if command.opcode() == 0x2100 => Some(*target),
            _ => None,
        })
        .collect();
    assert!(reply_targets.contains(&controller(1)));
    assert!(reply_targets.contains(&controller(7)));
}

#[test]
fn ip_prog_programs_and_mirrors() {
    let mut node = test_node(test_config());
    let effects = node.step(packet_event(
        ArtCommand::IpProg(IpProg {
            command: IpProgCommand::ENABLE | IpProgCommand::PROGRAM_IP | IpProgCommand::PROGRAM_MASK,
            ip: Ipv4Addr::new(2, 0, 0, 42),
            mask: Ipv4Addr::new(255, 0, 0, 0),
            ..IpProg::default()
        }),
        controller(1),
        Instant::now(),
    ));

    assert_eq!(node.identity().ip, Ipv4Addr::new(2, 0, 0, 42));
    let reply = effects.iter().find_map(|effect| match effect {
        Effect::Tx { command: ArtCommand::IpProgReply(reply), .. } => Some(reply.clone()),
        _ => None,
    });
    let reply = reply.expect("an IpProgReply should have been sent");
    assert_eq!(reply.ip, Ipv4Addr::new(2, 0, 0, 42));
    assert_eq!(reply.status & IP_PROG_STATUS_DHCP, 0);
}

#[test]
fn dhcp_bit_overrides_individual_programming() {
    let mut node = test_node(test_config());
    node.step(packet_event(
        ArtCommand::IpProg(IpProg {
            command: IpProgCommand::ENABLE | IpProgCommand::DHCP | IpProgCommand::PROGRAM_IP,
            ip: Ipv4Addr::new(9, 9, 9, 9),
            ..IpProg::default()
        }),
        controller(1),
        Instant::now(),
    ));
    assert!(node.identity().dhcp);
    assert_ne!(node.identity().ip, Ipv4Addr::new(9, 9, 9, 9));
    // and the derived status2 now reports DHCP active
    let reply = node.build_poll_reply(0);
    assert_ne!(reply.status_2 & crate::Status2::DHCP_ACTIVE.bits(), 0);
}

#[test]
fn triggers_are_rate_limited_per_scope() {
    let mut node = test_node(test_config());
    let t0 = Instant::now();
    let trigger = ArtCommand::Trigger(Trigger::default());

    let effects = node.step(packet_event(trigger.clone(), controller(1), t0));
    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::Callback(NodeEvent::Trigger { .. }))));

    let effects = node.step(packet_event(
        trigger,
        controller(1),
        t0 + Duration::from_millis(10),
    ));
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::Callback(NodeEvent::Trigger { .. }))));
}

#[test]
fn text_command_sets_port_labels() {
    let mut node = test_node(test_config());
    let effects = node.step(packet_event(
        ArtCommand::Command(Command {
            data: Text("SwoutText=Stage left\0\0".into()),
            ..Command::default()
        }),
        controller(1),
        Instant::now(),
    ));
    assert_eq!(node.pages()[0].ports[0].label_out, "Stage left");
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::TextCommand { .. })
    )));
}

#[test]
fn out_of_range_timecode_is_dropped() {
    use crate::command::{FrameType, Timecode};

    let mut node = test_node(test_config());
    // frame 24 does not exist at 24 fps
    let effects = node.step(packet_event(
        ArtCommand::Timecode(Timecode {
            frames: 24,
            frame_type: FrameType::Film,
            ..Timecode::default()
        }),
        controller(1),
        Instant::now(),
    ));
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::Callback(NodeEvent::Timecode { .. }))));

    let effects = node.step(packet_event(
        ArtCommand::Timecode(Timecode {
            frames: 24,
            ..Timecode::default() // SMPTE allows 0..=29
        }),
        controller(1),
        Instant::now(),
    ));
    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::Callback(NodeEvent::Timecode { .. }))));
}

#[test]
fn unknown_packets_surface_as_unhandled() {
    let mut node = test_node(test_config());
    let effects = node.step(Event::UnknownPacket {
        opcode: 0x1234,
        data: vec![1, 2, 3],
        sender: controller(1),
        at: Instant::now(),
    });
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Callback(NodeEvent::Unhandled { opcode: 0x1234, command: None, .. })
    )));
}

#[test]
fn keepalive_reemits_idle_outputs() {
    let mut node = test_node(test_config());
    let port = PortAddress::compose(1, 2, 3);
    let t0 = Instant::now();
    node.step(packet_event(dmx_packet(port, vec![7, 7]), controller(1), t0));

    // inside the window nothing is re-emitted
    let effects = node.step(Event::Tick {
        at: t0 + Duration::from_millis(500),
    });
    assert!(dmx_frames(&effects).is_empty());

    let effects = node.step(Event::Tick {
        at: t0 + Duration::from_millis(901),
    });
    assert_eq!(dmx_frames(&effects), vec![(port, vec![7, 7])]);
}

#[test]
fn deprecated_port_address_zero_warns_once() {
    let mut node = test_node(Config {
        pages: vec![PageConfig {
            net: 0,
            sub_net: 0,
            ports: vec![PortConfig::default()],
        }],
        ..Config::default()
    });
    let t0 = Instant::now();
    let effects = node.step(packet_event(
        dmx_packet(0u8.into(), vec![1, 2]),
        controller(1),
        t0,
    ));
    assert!(effects.iter().any(|effect| matches!(
        effect,
        Effect::Log { level: LogLevel::Warn, message } if message.contains("Port-Address 0")
    )));
    // and the frame is still processed
    assert_eq!(dmx_frames(&effects).len(), 1);

    let effects = node.step(packet_event(
        dmx_packet(0u8.into(), vec![1, 2]),
        controller(1),
        t0 + Duration::from_millis(1),
    ));
    assert!(!effects
        .iter()
        .any(|effect| matches!(effect, Effect::Log { level: LogLevel::Warn, .. })));
}

#[test]
fn stop_emits_stopped_and_freezes_the_node() {
    let mut node = test_node(test_config());
    let t0 = Instant::now();
    let effects = node.step(Event::Command {
        command: NodeCommand::Stop,
        at: t0,
    });
    assert!(effects.iter().any(|effect| matches!(effect, Effect::Stopped)));

    // state stays readable, events are dropped
    assert!(node.snapshot().stopped);
    let effects = node.step(Event::Tick {
        at: t0 + Duration::from_millis(100),
    });
    assert!(dmx_frames(&effects).is_empty());
}

#[test]
fn send_dmx_command_transmits_with_a_sequence() {
    let mut node = test_node(test_config());
    let port = PortAddress::compose(1, 2, 3);
    let effects = node.step(Event::Command {
        command: NodeCommand::SendDmx {
            port_address: port,
            data: vec![1, 2, 3],
            target: controller(1),
            physical: 0,
        },
        at: Instant::now(),
    });
    let output = effects.iter().find_map(|effect| match effect {
        Effect::Tx { command: ArtCommand::Output(output), target } => {
            Some((output.clone(), *target))
        }
        _ => None,
    });
    let (output, target) = output.expect("an ArtDmx should have been sent");
    assert_eq!(target, controller(1));
    assert_eq!(output.sequence, 1);
    assert_eq!(output.port_address, port);

    // oversized payloads are refused with an error log
    let effects = node.step(Event::Command {
        command: NodeCommand::SendDmx {
            port_address: port,
            data: vec![0; 513],
            target: controller(1),
            physical: 0,
        },
        at: Instant::now(),
    });
    assert!(tx_opcodes(&effects).is_empty());
    assert!(effects
        .iter()
        .any(|effect| matches!(effect, Effect::Log { level: LogLevel::Error, .. })));
}

#[test]
fn tod_request_is_answered_per_matching_port() {
    let mut node = test_node(Config {
        pages: vec![PageConfig {
            net: 1,
            sub_net: 2,
            ports: vec![PortConfig {
                universe: 3,
                rdm: true,
                ..PortConfig::default()
            }],
        }],
        ..Config::default()
    });
    let effects = node.step(packet_event(
        ArtCommand::TodRequest(TodRequest {
            net: 1,
            ..TodRequest::default()
        }),
        controller(1),
        Instant::now(),
    ));
    assert_eq!(tx_opcodes(&effects), vec![0x8100]);

    // a request for another net stays silent
    let mut node = test_node(test_config());
    let effects = node.step(packet_event(
        ArtCommand::TodRequest(TodRequest {
            net: 5,
            ..TodRequest::default()
        }),
        controller(1),
        Instant::now(),
    ));
    assert!(tx_opcodes(&effects).is_empty());
}

#[test]
fn completed_discovery_reaches_the_last_requester() {
    let mut node = test_node(Config {
        pages: vec![PageConfig {
            net: 1,
            sub_net: 2,
            ports: vec![PortConfig {
                universe: 3,
                rdm: true,
                ..PortConfig::default()
            }],
        }],
        ..Config::default()
    });
    let port = PortAddress::compose(1, 2, 3);
    let t0 = Instant::now();
    node.step(packet_event(
        ArtCommand::TodRequest(TodRequest {
            net: 1,
            ..TodRequest::default()
        }),
        controller(4),
        t0,
    ));

    let effects = node.step(Event::Command {
        command: NodeCommand::CompleteRdmDiscovery {
            port_address: port,
            uids: vec![Uid([0x7F, 0xF0, 0, 0, 0, 1])],
        },
        at: t0 + Duration::from_millis(10),
    });
    let tod = effects.iter().find_map(|effect| match effect {
        Effect::Tx { command: ArtCommand::TodData(tod), target } => Some((tod.clone(), *target)),
        _ => None,
    });
    let (tod, target) = tod.expect("a TodData should have been sent");
    assert_eq!(target, controller(4));
    assert_eq!(*tod.uid_total, 1);
}
