//! The I/O shell: a tokio runtime that owns the UDP socket, serializes
//! events into the [Node](crate::node::Node) state machine and executes its
//! effects.
//!
//! All protocol state lives in the node; the shell's jobs are datagram I/O,
//! the periodic tick, scheduled re-entry, observer dispatch and the
//! broadcast policy check.

use crate::node::{
    Config, Effect, Event, LogLevel, Node, NodeCommand, NodeEvent, NodeObserver, NodeSnapshot,
};
use crate::ArtCommand;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, error, info, warn};

/// Receive buffer size; Art-Net packets fit a single ethernet frame
const RECV_BUFFER_LEN: usize = 2048;

/// Why the shell could not run
#[derive(Debug, Error)]
pub enum ShellError {
    /// The configuration failed validation
    #[error("invalid configuration: {0}")]
    Config(#[from] crate::node::ConfigError),
    /// Binding or configuring the socket failed
    #[error("socket error: {0}")]
    Socket(#[from] std::io::Error),
    /// No usable interface was found for auto-selection
    #[error("no usable IPv4 interface found")]
    NoInterface,
    /// The node asked to broadcast a unicast-only opcode
    #[error("opcode 0x{0:04X} must not be broadcast")]
    BroadcastForbidden(u16),
    /// The runtime has already stopped
    #[error("node is stopped")]
    Stopped,
}

/// An observer that ignores everything, for callers that only poll state
pub struct NullObserver;

impl NodeObserver for NullObserver {
    fn on_event(&self, _event: &NodeEvent) {}
}

enum Request {
    Event(Event),
    Snapshot(oneshot::Sender<NodeSnapshot>),
}

/// A handle to a running node. Cloneable; the node stops when
/// [stop](NodeHandle::stop) is called, not when handles drop.
#[derive(Clone)]
pub struct NodeHandle {
    requests: mpsc::UnboundedSender<Request>,
    local_addr: SocketAddr,
}

impl NodeHandle {
    /// The address the node actually bound
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Enqueue one operator command
    pub fn enqueue_command(&self, command: NodeCommand) -> Result<(), ShellError> {
        self.requests
            .send(Request::Event(Event::Command {
                command,
                at: Instant::now(),
            }))
            .map_err(|_| ShellError::Stopped)
    }

    /// Transmit a DMX frame
    pub fn send_dmx(
        &self,
        port_address: crate::PortAddress,
        data: Vec<u8>,
        target: SocketAddr,
    ) -> Result<(), ShellError> {
        self.enqueue_command(NodeCommand::SendDmx {
            port_address,
            data,
            target,
            physical: 0,
        })
    }

    /// Transmit an RDM message
    pub fn send_rdm(
        &self,
        port_address: crate::PortAddress,
        data: Vec<u8>,
        target: SocketAddr,
    ) -> Result<(), ShellError> {
        self.enqueue_command(NodeCommand::SendRdm {
            port_address,
            data,
            target,
        })
    }

    /// Broadcast an ArtSync trigger
    pub fn send_sync(&self) -> Result<(), ShellError> {
        self.enqueue_command(NodeCommand::SendSync)
    }

    /// Send poll replies to one controller or every known peer
    pub fn send_poll_reply(&self, target: Option<SocketAddr>) -> Result<(), ShellError> {
        self.enqueue_command(NodeCommand::SendPollReply { target })
    }

    /// Emit a diagnostic to the subscribed controllers
    pub fn send_diagnostic(
        &self,
        priority: crate::DiagPriority,
        message: impl Into<String>,
    ) -> Result<(), ShellError> {
        self.enqueue_command(NodeCommand::SendDiagnostic {
            priority,
            logical_port: 0,
            message: message.into(),
        })
    }

    /// Patch parts of the node state
    pub fn apply_state(&self, patch: crate::node::StatePatch) -> Result<(), ShellError> {
        self.enqueue_command(NodeCommand::ApplyState(patch))
    }

    /// A snapshot of the node state. Works after stop as well, as long as
    /// the state task is still draining its queue.
    pub async fn snapshot(&self) -> Result<NodeSnapshot, ShellError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(Request::Snapshot(tx))
            .map_err(|_| ShellError::Stopped)?;
        rx.await.map_err(|_| ShellError::Stopped)
    }

    /// Stop the node: release the socket and timers. Idempotent.
    pub fn stop(&self) -> Result<(), ShellError> {
        self.enqueue_command(NodeCommand::Stop)
    }
}

/// The running node runtime
pub struct NodeRuntime;

impl NodeRuntime {
    /// Bind the socket, start the receive, tick and state tasks, and hand
    /// back the control handle.
    pub async fn start(
        config: Config,
        observer: Arc<dyn NodeObserver>,
    ) -> Result<NodeHandle, ShellError> {
        let bind_ip = resolve_bind_ip(config.bind_host)?;
        let bind_port = config.bind_port;
        let socket = bind_socket(bind_ip, bind_port)?;
        let socket = Arc::new(UdpSocket::from_std(socket)?);
        let local_addr = socket.local_addr()?;
        info!(%local_addr, "artnet node listening");

        let (mut node, startup) = Node::new(config)?;
        node.set_network(bind_ip, guess_netmask(bind_ip), detect_mac());

        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let tick_interval = Duration::from_millis(
            node.config().failsafe.tick_interval_ms.max(10),
        );
        let broadcast_addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), bind_port);

        // receive loop
        tokio::spawn(recv_loop(
            Arc::clone(&socket),
            requests_tx.clone(),
            cancel_rx.clone(),
        ));
        // periodic tick
        tokio::spawn(tick_loop(
            tick_interval,
            requests_tx.clone(),
            cancel_rx.clone(),
        ));
        // the single-writer state task
        tokio::spawn(state_loop(
            node,
            startup,
            requests_rx,
            requests_tx.clone(),
            socket,
            broadcast_addr,
            observer,
            cancel_tx,
        ));

        Ok(NodeHandle {
            requests: requests_tx,
            local_addr,
        })
    }
}

fn bind_socket(ip: Ipv4Addr, port: u16) -> Result<std::net::UdpSocket, std::io::Error> {
    let socket = socket2::Socket::new(
        socket2::Domain::IPV4,
        socket2::Type::DGRAM,
        Some(socket2::Protocol::UDP),
    )?;
    socket.set_reuse_address(true)?;
    #[cfg(not(windows))]
    socket.set_reuse_port(true)?;
    socket.set_broadcast(true)?;
    // bind the wildcard so directed and subnet broadcasts both arrive
    socket.bind(&SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port).into())?;
    socket.set_nonblocking(true)?;
    Ok(socket.into())
}

/// Resolve `0.0.0.0` to the primary interface, preferring 2.x then 10.x
/// networks the way Art-Net installations are usually addressed.
fn resolve_bind_ip(configured: Ipv4Addr) -> Result<Ipv4Addr, ShellError> {
    if !configured.is_unspecified() {
        return Ok(configured);
    }
    let interfaces = local_ip_address::list_afinet_netifas()
        .map_err(|_| ShellError::NoInterface)?;
    let mut candidates: Vec<Ipv4Addr> = interfaces
        .into_iter()
        .filter_map(|(_, ip)| match ip {
            IpAddr::V4(v4) if !v4.is_loopback() => Some(v4),
            _ => None,
        })
        .collect();
    candidates.sort_by_key(|ip| match ip.octets()[0] {
        2 => 0,
        10 => 1,
        _ => 2,
    });
    candidates.first().copied().ok_or(ShellError::NoInterface)
}

fn guess_netmask(ip: Ipv4Addr) -> Ipv4Addr {
    match ip.octets()[0] {
        2 | 10 => Ipv4Addr::new(255, 0, 0, 0),
        _ => Ipv4Addr::new(255, 255, 255, 0),
    }
}

fn detect_mac() -> [u8; 6] {
    match mac_address::get_mac_address() {
        Ok(Some(mac)) => mac.bytes(),
        _ => [0; 6],
    }
}

async fn recv_loop(
    socket: Arc<UdpSocket>,
    requests: mpsc::UnboundedSender<Request>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut buffer = vec![0u8; RECV_BUFFER_LEN];
    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return;
                }
            }
            received = socket.recv_from(&mut buffer) => {
                let (length, sender) = match received {
                    Ok(pair) => pair,
                    Err(error) => {
                        warn!(%error, "udp receive failed");
                        continue;
                    }
                };
                let at = Instant::now();
                let event = match ArtCommand::from_buffer(&buffer[..length]) {
                    Ok(command) => Event::Packet { command, sender, at },
                    Err(crate::Error::UnknownOpcode(opcode)) => Event::UnknownPacket {
                        opcode,
                        data: buffer[..length].to_vec(),
                        sender,
                        at,
                    },
                    Err(error) => {
                        debug!(%sender, %error, "dropping undecodable datagram");
                        continue;
                    }
                };
                if requests.send(Request::Event(event)).is_err() {
                    return;
                }
            }
        }
    }
}

async fn tick_loop(
    interval: Duration,
    requests: mpsc::UnboundedSender<Request>,
    mut cancel: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            changed = cancel.changed() => {
                if changed.is_err() || *cancel.borrow() {
                    return;
                }
            }
            _ = ticker.tick() => {
                let event = Event::Tick { at: Instant::now() };
                if requests.send(Request::Event(event)).is_err() {
                    return;
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn state_loop(
    mut node: Node,
    startup: Vec<Effect>,
    mut requests: mpsc::UnboundedReceiver<Request>,
    requeue: mpsc::UnboundedSender<Request>,
    socket: Arc<UdpSocket>,
    broadcast_addr: SocketAddr,
    observer: Arc<dyn NodeObserver>,
    cancel: watch::Sender<bool>,
) {
    for effect in startup {
        execute_effect(effect, &socket, broadcast_addr, &requeue, &observer, &cancel).await;
    }

    while let Some(request) = requests.recv().await {
        match request {
            Request::Snapshot(reply) => {
                let _ = reply.send(node.snapshot());
            }
            Request::Event(event) => {
                for effect in node.step(event) {
                    execute_effect(effect, &socket, broadcast_addr, &requeue, &observer, &cancel)
                        .await;
                }
            }
        }
    }
}

async fn execute_effect(
    effect: Effect,
    socket: &Arc<UdpSocket>,
    broadcast_addr: SocketAddr,
    requeue: &mpsc::UnboundedSender<Request>,
    observer: &Arc<dyn NodeObserver>,
    cancel: &watch::Sender<bool>,
) {
    match effect {
        Effect::Tx { command, target } => {
            send_packet(socket, &command, target).await;
        }
        Effect::Broadcast { command } => {
            if !command.broadcast_allowed() {
                let error = ShellError::BroadcastForbidden(command.opcode());
                error!(%error, "refusing spec-violating broadcast");
                return;
            }
            send_packet(socket, &command, broadcast_addr).await;
        }
        Effect::Callback(event) => {
            // an observer panic must not tear down the node
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                observer.on_event(&event)
            }));
            if result.is_err() {
                error!("observer panicked, continuing");
            }
        }
        Effect::Log { level, message } => match level {
            LogLevel::Debug => debug!("{}", message),
            LogLevel::Info => info!("{}", message),
            LogLevel::Warn => warn!("{}", message),
            LogLevel::Error => error!("{}", message),
        },
        Effect::Schedule { delay, action } => {
            let requeue = requeue.clone();
            let mut cancel_rx = cancel.subscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {
                        let _ = requeue.send(Request::Event(Event::Scheduled {
                            action,
                            at: Instant::now(),
                        }));
                    }
                    _ = cancel_rx.changed() => {}
                }
            });
        }
        Effect::DmxFrame {
            port_address,
            sequence,
            data,
        } => {
            // the library has no DMX hardware driver; the frame is traced
            // and surfaced through the observer's Dmx events instead
            debug!(
                port_address = %port_address,
                sequence,
                slots = data.len(),
                "dmx frame output"
            );
        }
        Effect::Stopped => {
            info!("node stopped, releasing shell resources");
            let _ = cancel.send(true);
        }
    }
}

async fn send_packet(socket: &Arc<UdpSocket>, command: &ArtCommand, target: SocketAddr) {
    let bytes = match command.write_to_buffer() {
        Ok(bytes) => bytes,
        Err(error) => {
            error!(%error, opcode = command.opcode(), "failed to encode outgoing packet");
            return;
        }
    };
    if let Err(error) = socket.send_to(&bytes, target).await {
        warn!(%error, %target, "udp send failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn netmask_follows_the_artnet_address_plan() {
        assert_eq!(
            guess_netmask(Ipv4Addr::new(2, 0, 0, 1)),
            Ipv4Addr::new(255, 0, 0, 0)
        );
        assert_eq!(
            guess_netmask(Ipv4Addr::new(192, 168, 1, 10)),
            Ipv4Addr::new(255, 255, 255, 0)
        );
    }

    #[test]
    fn configured_bind_addresses_pass_through() {
        assert_eq!(
            resolve_bind_ip(Ipv4Addr::new(10, 1, 2, 3)).unwrap(),
            Ipv4Addr::new(10, 1, 2, 3)
        );
    }
}
