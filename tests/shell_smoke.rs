//! Drives a full node over a real UDP socket on localhost.

use artnet_node::node::{Config, NodeEvent, NodeObserver};
use artnet_node::shell::NodeRuntime;
use artnet_node::{ArtCommand, ArtTalkToMe, Poll};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::Duration;

struct ChannelObserver(std::sync::Mutex<mpsc::Sender<String>>);

impl NodeObserver for ChannelObserver {
    fn on_event(&self, event: &NodeEvent) {
        let tag = match event {
            NodeEvent::Dmx { .. } => "dmx",
            NodeEvent::Unhandled { .. } => "unhandled",
            _ => return,
        };
        let _ = self.0.lock().unwrap().send(tag.to_owned());
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn poll_and_dmx_over_loopback() {
    // an uncommon port so parallel test runs do not collide
    let port = 16454;
    let config = Config {
        bind_host: Ipv4Addr::LOCALHOST,
        bind_port: port,
        ..Config::default()
    };
    // the default page outputs universe 0:0:0

    let (events_tx, events_rx) = mpsc::channel();
    let observer = Arc::new(ChannelObserver(std::sync::Mutex::new(events_tx)));
    let handle = NodeRuntime::start(config, observer)
        .await
        .expect("node should start");

    let client = std::net::UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    client
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();
    let node_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));

    // a poll with suppressed delay is answered with a PollReply
    let poll = ArtCommand::Poll(Poll {
        talk_to_me: ArtTalkToMe::SUPPRESS_REPLY_DELAY,
        ..Poll::default()
    });
    client
        .send_to(&poll.write_to_buffer().unwrap(), node_addr)
        .unwrap();

    let mut buffer = [0u8; 1024];
    let (length, _) = client.recv_from(&mut buffer).unwrap();
    let reply = ArtCommand::from_buffer(&buffer[..length]).unwrap();
    assert_eq!(reply.opcode(), 0x2100);

    // a DMX frame reaches the observer
    let dmx = ArtCommand::Output(artnet_node::Output {
        port_address: 0u8.into(),
        data: vec![1, 2, 3, 4].into(),
        ..artnet_node::Output::default()
    });
    client
        .send_to(&dmx.write_to_buffer().unwrap(), node_addr)
        .unwrap();

    let event = tokio::task::spawn_blocking(move || {
        events_rx.recv_timeout(Duration::from_secs(5))
    })
    .await
    .unwrap()
    .expect("the dmx callback should fire");
    assert_eq!(event, "dmx");

    handle.stop().unwrap();
    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.stopped);
}
