//! A full Art-Net node on universe 0:0:1, printing every DMX frame it
//! outputs and answering discovery, programming and RDM traffic.

use artnet_node::node::{Config, NodeEvent, NodeObserver};
use artnet_node::shell::NodeRuntime;
use std::sync::Arc;

struct PrintObserver;

impl NodeObserver for PrintObserver {
    fn on_event(&self, event: &NodeEvent) {
        match event {
            NodeEvent::Dmx {
                port_address,
                data,
                merged,
                failsafe,
                ..
            } => {
                println!(
                    "dmx {} ({} slots, merged: {}, failsafe: {:?})",
                    port_address,
                    data.len(),
                    merged,
                    failsafe
                );
            }
            NodeEvent::Trigger { scope, .. } => println!("trigger fired: {:?}", scope),
            NodeEvent::Unhandled { opcode, .. } => println!("unhandled opcode 0x{:04X}", opcode),
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

    let mut config = Config::default();
    config.short_name = "demo-node".to_owned();
    config.pages[0].ports[0].universe = 1;
    config.failsafe.enabled = true;

    let handle = NodeRuntime::start(config, Arc::new(PrintObserver)).await?;
    println!("node running on {}", handle.local_addr());

    tokio::signal::ctrl_c().await?;
    handle.stop()?;
    let snapshot = handle.snapshot().await?;
    println!(
        "stopped; {} peer(s) seen, {} active output(s)",
        snapshot.peers, snapshot.active_outputs
    );
    Ok(())
}
