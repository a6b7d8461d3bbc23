//! Walks the protocol core without a single socket: builds a node, feeds it
//! a controller's traffic by hand and prints every effect it asks the shell
//! to execute. Useful for seeing the discovery, merge and failsafe engines
//! react step by step.

use artnet_node::node::config::{FailsafeConfig, PageConfig, PortConfig};
use artnet_node::node::failsafe::FailsafeMode;
use artnet_node::node::{Config, Effect, Event, Node};
use artnet_node::{ArtCommand, ArtTalkToMe, Output, Poll, PortAddress};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

fn main() {
    let config = Config {
        pages: vec![PageConfig {
            net: 0,
            sub_net: 0,
            ports: vec![PortConfig {
                universe: 1,
                ..PortConfig::default()
            }],
        }],
        failsafe: FailsafeConfig {
            enabled: true,
            mode: FailsafeMode::Zero,
            ..FailsafeConfig::default()
        },
        ..Config::default()
    };
    let (mut node, startup) = Node::new(config).expect("the demo config is valid");
    // replies come back immediately instead of after a random delay
    node.set_delay_source(Box::new(|| 0));
    print_effects("startup", &startup);

    let console: SocketAddr = "10.0.0.10:6454".parse().unwrap();
    let desk: SocketAddr = "10.0.0.20:6454".parse().unwrap();
    let port = PortAddress::compose(0, 0, 1);
    let t0 = Instant::now();

    let poll = ArtCommand::Poll(Poll {
        talk_to_me: ArtTalkToMe::SUPPRESS_REPLY_DELAY,
        ..Poll::default()
    });
    print_effects(
        "the console polls",
        &node.step(Event::Packet {
            command: poll,
            sender: console,
            at: t0,
        }),
    );

    let frame = |data: Vec<u8>| {
        ArtCommand::Output(Output {
            port_address: port,
            data: data.into(),
            ..Output::default()
        })
    };
    print_effects(
        "dmx from the console",
        &node.step(Event::Packet {
            command: frame(vec![100, 0, 50]),
            sender: console,
            at: t0 + Duration::from_millis(10),
        }),
    );
    print_effects(
        "dmx from the desk joins, HTP merge",
        &node.step(Event::Packet {
            command: frame(vec![0, 100, 200]),
            sender: desk,
            at: t0 + Duration::from_millis(20),
        }),
    );

    print_effects(
        "a tick inside the keep-alive window",
        &node.step(Event::Tick {
            at: t0 + Duration::from_millis(500),
        }),
    );
    print_effects(
        "a tick after both controllers go quiet for 7 s, failsafe engages",
        &node.step(Event::Tick {
            at: t0 + Duration::from_secs(7),
        }),
    );
}

fn print_effects(label: &str, effects: &[Effect]) {
    println!("== {label}");
    for effect in effects {
        match effect {
            Effect::Tx { command, target } => {
                println!("   tx 0x{:04X} -> {}", command.opcode(), target)
            }
            Effect::Broadcast { command } => println!("   broadcast 0x{:04X}", command.opcode()),
            Effect::Callback(event) => println!("   callback {:?}", event),
            Effect::Log { level, message } => println!("   log {:?}: {}", level, message),
            Effect::Schedule { delay, .. } => println!("   schedule a reply in {:?}", delay),
            Effect::DmxFrame {
                port_address,
                data,
                ..
            } => println!("   dmx out {} {:?}", port_address, data),
            Effect::Stopped => println!("   stopped"),
        }
    }
}
