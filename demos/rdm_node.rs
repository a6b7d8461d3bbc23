//! A node with an RDM-enabled port whose "driver" is a fake: discovery
//! dispatches from the scheduler are answered with two made-up responders.
//! Point a controller at it and its ArtTodControl flush / ArtTodRequest
//! traffic comes back with a populated Table of Devices, and the background
//! queue starts polling the fake UIDs.

use artnet_node::convert::Uid;
use artnet_node::node::config::{PageConfig, PortConfig, RdmBackgroundConfig, RdmConfig};
use artnet_node::node::{Config, NodeCommand, NodeEvent, NodeObserver};
use artnet_node::shell::{NodeHandle, NodeRuntime};
use std::sync::{Arc, Mutex};

struct FakeRdmDriver {
    handle: Mutex<Option<NodeHandle>>,
}

impl NodeObserver for FakeRdmDriver {
    fn on_event(&self, event: &NodeEvent) {
        match event {
            NodeEvent::RdmDiscovery(dispatch) => {
                let guard = self.handle.lock().unwrap();
                let Some(handle) = guard.as_ref() else { return };
                for port in &dispatch.ports {
                    let uids = vec![
                        Uid([0x7F, 0xF0, 0, 0, 0, 1]),
                        Uid([0x7F, 0xF0, 0, 0, 0, 2]),
                    ];
                    println!("discovery on {port} answered with {} fake responders", uids.len());
                    let _ = handle.enqueue_command(NodeCommand::CompleteRdmDiscovery {
                        port_address: *port,
                        uids,
                    });
                }
            }
            NodeEvent::RdmPoll(poll) => {
                println!("background queue polls {:?} for pids {:04X?}", poll.uids, poll.pids)
            }
            NodeEvent::Rdm { packet, sender } => {
                println!("rdm for {} from {}: {} bytes", packet.port_address(), sender, packet.data.len())
            }
            NodeEvent::TodRequest { sender, .. } => println!("tod requested by {sender}"),
            NodeEvent::TodControl { packet, sender } => {
                println!("tod control {:?} on {} from {}", packet.command, packet.port_address(), sender)
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = Config {
        short_name: "rdm-demo".to_owned(),
        pages: vec![PageConfig {
            net: 0,
            sub_net: 0,
            ports: vec![PortConfig {
                universe: 1,
                rdm: true,
                ..PortConfig::default()
            }],
        }],
        rdm: RdmConfig {
            background: RdmBackgroundConfig {
                supported: true,
                policy: 2, // collect warnings and above
                ..RdmBackgroundConfig::default()
            },
            ..RdmConfig::default()
        },
        ..Config::default()
    };

    let driver = Arc::new(FakeRdmDriver {
        handle: Mutex::new(None),
    });
    let handle = NodeRuntime::start(config, Arc::clone(&driver) as Arc<dyn NodeObserver>).await?;
    *driver.handle.lock().unwrap() = Some(handle.clone());
    println!("rdm node on {}; send an ArtTodControl flush to kick off discovery", handle.local_addr());

    tokio::signal::ctrl_c().await?;
    handle.stop()?;
    Ok(())
}
