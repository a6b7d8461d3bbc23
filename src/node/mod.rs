//! The protocol state machine.
//!
//! [Node] is pure: it never touches sockets, clocks or randomness. Every
//! mutation goes through [Node::step], which consumes one [Event] (carrying
//! its own timestamp) and returns the [Effect]s the shell must execute.
//! The shell serializes events into the node; effects from one step are
//! executed before the next step observes anything.

pub mod config;
pub mod diagnostics;
pub mod discovery;
pub mod failsafe;
pub mod firmware;
pub mod merge;
pub mod programming;
pub mod rdm;
pub mod state;
pub mod sync;
pub mod trigger;

pub use config::{Config, ConfigError};
pub use state::{IndicatorState, NodeIdentity, PortDirection, PortPage, PortProtocol, PortSlot};
pub use sync::SyncIgnoreReason;

use crate::command::{
    Address, ArtCommand, Command, DataReply, DataRequest, DiagData, DiagPriority, FirmwareReply,
    FirmwareReplyStatus, Input, IpProg, IpProgCommand, IpProgReply, Output, PollReply, Rdm,
    RdmSub, Timecode, TodControl, TodControlCommand, TodRequest, Trigger,
};
use crate::convert::{FixedString, SlotData, Text, U16Be, Uid};
use crate::{GoodInput, GoodOutputA, PortAddress, IP_PROG_STATUS_DHCP};
use diagnostics::{DiagnosticsEngine, WarningEdge};
use discovery::{page_matches_target, DiscoveryEngine, MAX_REPLY_DELAY_MS};
use failsafe::{FailsafeEngine, FailsafeMode};
use firmware::{FirmwareEngine, FirmwareProgress};
use merge::{MergeEngine, MergeMode, MergeOutcome};
use programming::{AddressTarget, CommandInfo, FieldChange};
use rand::Rng;
use rdm::{BackgroundPoll, DiscoveryDispatch, RdmEngine, RdmPort};
use serde::Serialize;
use state::{
    format_node_report, normalize_identity, DerivedCapabilities, NodeDefaults, NodeReportCode,
    PortOutput, StatusOverrides,
};
use std::collections::HashMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};
use sync::{StagedFrame, SyncEngine, SyncMode};
use trigger::{TriggerEngine, TriggerScope};

/// An idle input re-transmits its frame inside the recommended 800..1000 ms
/// window; the node aims for the middle
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_millis(900);

/// The injectable source of poll-reply delays, returning milliseconds in
/// `0..=1000`. Tests inject a constant.
pub type DelaySource = Box<dyn FnMut() -> u64 + Send>;

/// One input to the state machine. Timestamps ride on the event so the core
/// never reads a clock.
#[derive(Debug, Clone)]
pub enum Event {
    /// A decoded datagram
    Packet {
        /// The decoded packet
        command: ArtCommand,
        /// Who sent it
        sender: SocketAddr,
        /// When it was received
        at: Instant,
    },
    /// A datagram with a valid header but an opcode this crate cannot decode
    UnknownPacket {
        /// The raw opcode
        opcode: u16,
        /// The datagram body after the opcode
        data: Vec<u8>,
        /// Who sent it
        sender: SocketAddr,
        /// When it was received
        at: Instant,
    },
    /// The periodic timer
    Tick {
        /// When it fired
        at: Instant,
    },
    /// A previously scheduled action coming due
    Scheduled {
        /// What to do
        action: ScheduledAction,
        /// When it fired
        at: Instant,
    },
    /// Operator intent
    Command {
        /// The command
        command: NodeCommand,
        /// When it was issued
        at: Instant,
    },
    /// Replace the configuration
    Configure {
        /// The new configuration
        config: Box<Config>,
        /// When it was issued
        at: Instant,
    },
}

/// Work the node asked the shell to perform later
#[derive(Debug, Clone, PartialEq)]
pub enum ScheduledAction {
    /// Send the poll reply for one page, after the discovery random delay
    SendPollReply {
        /// Who to answer
        target: SocketAddr,
        /// Which page, by index
        page: usize,
    },
}

/// Partial state replacement carried by the apply-state command
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatePatch {
    /// New short name
    pub short_name: Option<String>,
    /// New long name
    pub long_name: Option<String>,
    /// New indicator state
    pub indicator: Option<IndicatorState>,
    /// New failsafe mode
    pub failsafe_mode: Option<FailsafeMode>,
    /// New background queue policy
    pub background_queue_policy: Option<u8>,
}

/// Operator commands, the node-side of the CLI surface
#[derive(Debug, Clone)]
pub enum NodeCommand {
    /// Transmit a DMX frame
    SendDmx {
        /// The destination Port-Address
        port_address: PortAddress,
        /// The slot data, 1..=512 bytes
        data: Vec<u8>,
        /// Where to send it
        target: SocketAddr,
        /// The physical port to report
        physical: u8,
    },
    /// Transmit an RDM message
    SendRdm {
        /// The destination Port-Address
        port_address: PortAddress,
        /// The RDM message without its start code
        data: Vec<u8>,
        /// Where to send it
        target: SocketAddr,
    },
    /// Broadcast an ArtSync trigger
    SendSync,
    /// Send the node's poll replies, to one controller or every known peer
    SendPollReply {
        /// The controller to answer, or None for every known peer
        target: Option<SocketAddr>,
    },
    /// Emit a diagnostic message to the subscribed controllers
    SendDiagnostic {
        /// The message priority
        priority: DiagPriority,
        /// The logical port the message concerns
        logical_port: u8,
        /// The text
        message: String,
    },
    /// Patch parts of the node state
    ApplyState(StatePatch),
    /// Report a finished RDM discovery back into the node
    CompleteRdmDiscovery {
        /// The port that was walked
        port_address: PortAddress,
        /// The responders found
        uids: Vec<Uid>,
    },
    /// Release shell resources. The state stays readable afterwards.
    Stop,
}

/// Log levels the core emits; the shell maps them onto its tracing setup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Chatty details
    Debug,
    /// Normal operation
    Info,
    /// Something off, node keeps running
    Warn,
    /// Something broken
    Error,
}

/// One side effect for the shell to execute, in order
#[derive(Debug, Clone)]
pub enum Effect {
    /// Send a packet to one address
    Tx {
        /// The packet
        command: ArtCommand,
        /// The destination
        target: SocketAddr,
    },
    /// Broadcast a packet. The shell refuses opcodes whose
    /// [broadcast_allowed](ArtCommand::broadcast_allowed) is false.
    Broadcast {
        /// The packet
        command: ArtCommand,
    },
    /// Surface an event to application code
    Callback(NodeEvent),
    /// Log a message
    Log {
        /// Severity
        level: LogLevel,
        /// The message
        message: String,
    },
    /// Re-enter the state machine with an action after a delay
    Schedule {
        /// How long to wait
        delay: Duration,
        /// What to do then
        action: ScheduledAction,
    },
    /// Drive a local DMX output port
    DmxFrame {
        /// The Port-Address being driven
        port_address: PortAddress,
        /// The sequence number of the frame
        sequence: u8,
        /// The slot data
        data: Vec<u8>,
    },
    /// The stop command completed; the shell may release its resources
    Stopped,
}

/// Application-visible events, one variant per callback key.
///
/// Payload buffers are owned by the event value; observers that retain data
/// past the callback must copy it (`Vec` payloads make that a `clone`).
#[derive(Debug, Clone)]
pub enum NodeEvent {
    /// A DMX frame was output
    Dmx {
        /// The Port-Address it belongs to
        port_address: PortAddress,
        /// The sequence number it carried
        sequence: u8,
        /// The physical port it was input on
        physical: u8,
        /// The slot data after merging
        data: Vec<u8>,
        /// Who sent it, None for node-generated frames
        sender: Option<SocketAddr>,
        /// Whether an ArtSync released it
        synced: bool,
        /// Whether two sources were merged into it
        merged: bool,
        /// Set when failsafe synthesized the frame
        failsafe: Option<FailsafeMode>,
    },
    /// An ArtSync was handled or ignored
    Sync {
        /// Who sent the trigger
        sender: SocketAddr,
        /// How many staged frames it released
        released: usize,
        /// Why it was ignored, when it was
        ignored: Option<SyncIgnoreReason>,
    },
    /// An RDM message arrived for one of our ports
    Rdm {
        /// The packet
        packet: Rdm,
        /// Who sent it
        sender: SocketAddr,
    },
    /// Compressed sub-device data arrived
    RdmSub {
        /// The packet
        packet: RdmSub,
        /// Who sent it
        sender: SocketAddr,
    },
    /// A controller asked for our Table of Devices
    TodRequest {
        /// The request
        packet: TodRequest,
        /// Who sent it
        sender: SocketAddr,
    },
    /// A controller steered our RDM discovery
    TodControl {
        /// The control
        packet: TodControl,
        /// Who sent it
        sender: SocketAddr,
    },
    /// Timecode arrived
    Timecode {
        /// The packet
        packet: Timecode,
        /// Who sent it
        sender: SocketAddr,
    },
    /// Another node's diagnostics arrived
    DiagData {
        /// The packet
        packet: DiagData,
        /// Who sent it
        sender: SocketAddr,
    },
    /// Another node answered a poll
    PollReply {
        /// The reply
        packet: Box<PollReply>,
        /// Who sent it
        sender: SocketAddr,
    },
    /// A node answered a data request
    DataReply {
        /// The reply
        packet: DataReply,
        /// Who sent it
        sender: SocketAddr,
    },
    /// A node acknowledged a firmware block we sent
    FirmwareReply {
        /// The reply
        packet: FirmwareReply,
        /// Who sent it
        sender: SocketAddr,
    },
    /// A trigger fired
    Trigger {
        /// The classified trigger
        scope: TriggerScope,
        /// The trigger payload
        payload: Vec<u8>,
        /// Who sent it
        sender: SocketAddr,
    },
    /// Text directives arrived
    TextCommand {
        /// The parsed `key=value` pairs
        directives: Vec<(String, String)>,
        /// Who sent them
        sender: SocketAddr,
    },
    /// An ArtAddress reprogrammed the node
    Address {
        /// Every field that changed
        changes: Vec<FieldChange>,
        /// The command that executed, if any
        command: Option<CommandInfo>,
        /// Who sent it
        sender: SocketAddr,
    },
    /// An ArtIpProg reprogrammed the network configuration
    IpProg {
        /// The packet
        packet: IpProg,
        /// Who sent it
        sender: SocketAddr,
    },
    /// An ArtInput enabled or disabled inputs
    Input {
        /// Disable flag per port
        disabled: [bool; 4],
        /// Who sent it
        sender: SocketAddr,
    },
    /// A firmware upload made progress
    Firmware {
        /// How far it got
        progress: FirmwareProgress,
        /// Who is uploading
        sender: SocketAddr,
    },
    /// The discovery scheduler wants the RDM driver to walk these ports
    RdmDiscovery(DiscoveryDispatch),
    /// The background queue wants these responders polled
    RdmPoll(BackgroundPoll),
    /// An opcode the node does not act on
    Unhandled {
        /// The raw opcode
        opcode: u16,
        /// The decoded packet, None when the opcode is unknown to the codec
        command: Option<Box<ArtCommand>>,
        /// Who sent it
        sender: SocketAddr,
    },
}

/// Receives every [NodeEvent] the shell executes.
///
/// Callbacks run on the shell's state task; panics are caught and logged,
/// they never tear the node down. Buffers inside the event are only
/// guaranteed for the duration of the call; copy what you keep.
pub trait NodeObserver: Send + std::marker::Sync {
    /// Handle one event
    fn on_event(&self, event: &NodeEvent);
}

/// A serializable snapshot of the node, for the `state` surface
#[derive(Debug, Clone, Serialize)]
pub struct NodeSnapshot {
    /// The node identity
    pub identity: NodeIdentity,
    /// The port pages
    pub pages: Vec<PortPage>,
    /// Number of known peers
    pub peers: usize,
    /// The configured sync mode
    pub sync_mode: SyncMode,
    /// The sync mode currently in effect
    pub active_sync_mode: SyncMode,
    /// Ports with recorded output
    pub active_outputs: usize,
    /// UID count per RDM port
    pub tod_sizes: HashMap<u16, usize>,
    /// Whether stop was requested
    pub stopped: bool,
}

/// The Art-Net node state machine
pub struct Node {
    config: Config,
    identity: NodeIdentity,
    defaults: NodeDefaults,
    overrides: StatusOverrides,
    pages: Vec<PortPage>,
    outputs: HashMap<PortAddress, PortOutput>,
    tx_sequences: HashMap<PortAddress, u8>,
    merge: MergeEngine,
    sync: SyncEngine,
    failsafe: FailsafeEngine,
    discovery: DiscoveryEngine,
    diagnostics: DiagnosticsEngine,
    triggers: TriggerEngine,
    firmware: FirmwareEngine,
    rdm: RdmEngine,
    delay_source: DelaySource,
    poll_reply_count: u32,
    report: (NodeReportCode, String),
    warned_zero_address: bool,
    stopped: bool,
}

impl Node {
    /// Build the initial state from a validated configuration.
    ///
    /// Also returns the startup effects (log lines such as the prototype
    /// ESTA warning) for the shell to execute before the first event.
    pub fn new(config: Config) -> Result<(Node, Vec<Effect>), ConfigError> {
        config.validate()?;

        let mut identity = NodeIdentity {
            short_name: config.short_name.clone(),
            long_name: config.long_name.clone(),
            oem: config.oem,
            esta: config.esta,
            style: config.style,
            acn_priority: config.acn_priority,
            mac: config.mac.unwrap_or([0; 6]),
            ..NodeIdentity::default()
        };
        normalize_identity(&mut identity);

        let defaults = NodeDefaults {
            short_name: identity.short_name.clone(),
            long_name: identity.long_name.clone(),
            net: config.pages.first().map(|page| page.net).unwrap_or(0),
            sub_net: config.pages.first().map(|page| page.sub_net).unwrap_or(0),
            universes: {
                let mut universes = [0u8; 4];
                if let Some(page) = config.pages.first() {
                    for (index, port) in page.ports.iter().take(4).enumerate() {
                        universes[index] = port.universe & 0x0F;
                    }
                }
                universes
            },
            acn_priority: identity.acn_priority,
        };

        let pages: Vec<PortPage> = config
            .pages
            .iter()
            .enumerate()
            .map(|(index, page)| PortPage {
                bind_index: (index + 1) as u8,
                net: page.net & 0x7F,
                sub_net: page.sub_net & 0x0F,
                ports: page
                    .ports
                    .iter()
                    .map(|port| PortSlot {
                        direction: port.direction,
                        universe_out: port.universe & 0x0F,
                        universe_in: port.universe & 0x0F,
                        merge_mode: port.merge_mode,
                        rdm_enabled: port.rdm,
                        ..PortSlot::default()
                    })
                    .collect(),
                port_addresses: None,
            })
            .collect();

        let rdm_ports: Vec<RdmPort> = pages
            .iter()
            .flat_map(|page| {
                page.ports
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.rdm_enabled)
                    .map(|(index, slot)| {
                        RdmPort::new(
                            page.output_address(slot),
                            (index + 1) as u8,
                            page.bind_index,
                        )
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        let node = Node {
            identity,
            defaults,
            overrides: config.status_overrides,
            pages,
            outputs: HashMap::new(),
            tx_sequences: HashMap::new(),
            merge: MergeEngine::default(),
            sync: SyncEngine::new(
                config.sync.mode,
                Duration::from_millis(config.sync.buffer_ttl_ms),
            ),
            failsafe: FailsafeEngine::new(
                config.failsafe.enabled,
                config.failsafe.mode,
                Duration::from_millis(config.failsafe.idle_timeout_ms),
                Duration::from_millis(config.failsafe.tick_interval_ms),
            ),
            discovery: DiscoveryEngine::new(
                config.discovery.reply_on_change_limit,
                config.discovery.reply_on_change_policy,
            ),
            diagnostics: DiagnosticsEngine::new(
                Duration::from_millis(config.diagnostics.subscriber_ttl_ms),
                config.diagnostics.subscriber_warning_threshold,
                config.diagnostics.rate_limit_hz,
            ),
            triggers: TriggerEngine::new(Duration::from_millis(config.triggers.min_interval_ms)),
            firmware: FirmwareEngine::default(),
            rdm: RdmEngine::new(
                rdm_ports,
                config.rdm.discovery.batch_size,
                Duration::from_millis(config.rdm.discovery.step_delay_ms),
                Duration::from_millis(config.rdm.discovery.initial_delay_ms),
                Duration::from_millis(config.rdm.discovery.max_backoff_ms),
                config.rdm.background.supported,
                config.rdm.background.policy,
                Duration::from_millis(config.rdm.background.poll_interval_ms),
            ),
            delay_source: Box::new(|| rand::thread_rng().gen_range(0..=MAX_REPLY_DELAY_MS)),
            poll_reply_count: 0,
            report: (NodeReportCode::PowerOk, "Node started".to_owned()),
            warned_zero_address: false,
            stopped: false,
            config,
        };

        let mut startup = vec![Effect::Log {
            level: LogLevel::Info,
            message: format!(
                "node '{}' initialized with {} page(s)",
                node.identity.short_name,
                node.pages.len()
            ),
        }];
        if node.identity.esta == state::ESTA_PROTOTYPE {
            startup.push(Effect::Log {
                level: LogLevel::Warn,
                message: "ESTA manufacturer code is the 0x7FF0 prototype id; set esta before shipping"
                    .to_owned(),
            });
        }

        Ok((node, startup))
    }

    /// Replace the random poll-reply delay source, the test seam
    pub fn set_delay_source(&mut self, source: DelaySource) {
        self.delay_source = source;
    }

    /// Record the network parameters the shell bound to
    pub fn set_network(&mut self, ip: Ipv4Addr, netmask: Ipv4Addr, mac: [u8; 6]) {
        self.identity.ip = ip;
        self.identity.netmask = netmask;
        if self.config.mac.is_none() {
            self.identity.mac = mac;
        }
    }

    /// The node identity
    pub fn identity(&self) -> &NodeIdentity {
        &self.identity
    }

    /// The port pages
    pub fn pages(&self) -> &[PortPage] {
        &self.pages
    }

    /// The configuration the node was built from
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A serializable snapshot of the current state
    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            identity: self.identity.clone(),
            pages: self.pages.clone(),
            peers: self.discovery.peer_count(),
            sync_mode: self.sync.configured(),
            active_sync_mode: self.sync.active(),
            active_outputs: self.outputs.len(),
            tod_sizes: self
                .rdm
                .ports()
                .map(|port| (u16::from(port.port_address), port.uids.len()))
                .collect(),
            stopped: self.stopped,
        }
    }

    /// Advance the state machine by one event
    pub fn step(&mut self, event: Event) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.stopped {
            return vec![Effect::Log {
                level: LogLevel::Debug,
                message: "event dropped, node is stopped".to_owned(),
            }];
        }

        match event {
            Event::Packet { command, sender, at } => {
                self.handle_packet(command, sender, at, &mut effects)
            }
            Event::UnknownPacket { opcode, sender, .. } => {
                effects.push(Effect::Callback(NodeEvent::Unhandled {
                    opcode,
                    command: None,
                    sender,
                }));
            }
            Event::Tick { at } => self.handle_tick(at, &mut effects),
            Event::Scheduled { action, at } => self.handle_scheduled(action, at, &mut effects),
            Event::Command { command, at } => self.handle_command(command, at, &mut effects),
            Event::Configure { config, at } => self.reconfigure(*config, at, &mut effects),
        }
        effects
    }

    fn handle_packet(
        &mut self,
        command: ArtCommand,
        sender: SocketAddr,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match command {
            ArtCommand::Output(output) => self.handle_output(output, sender, at, effects),
            ArtCommand::Nzs(nzs) => match nzs.vlc() {
                Err(error) => effects.push(Effect::Log {
                    level: LogLevel::Debug,
                    message: format!("dropping broken VLC frame from {}: {}", sender, error),
                }),
                Ok(_) => effects.push(Effect::Callback(NodeEvent::Unhandled {
                    opcode: 0x5100,
                    command: Some(Box::new(ArtCommand::Nzs(nzs))),
                    sender,
                })),
            },
            ArtCommand::Sync(_) => self.handle_sync(sender, at, effects),
            ArtCommand::Poll(poll) => self.handle_poll(poll, sender, at, effects),
            ArtCommand::PollReply(reply) => {
                self.discovery.note_sender(sender, at);
                effects.push(Effect::Callback(NodeEvent::PollReply {
                    packet: reply,
                    sender,
                }));
            }
            ArtCommand::DiagData(packet) => {
                effects.push(Effect::Callback(NodeEvent::DiagData { packet, sender }))
            }
            ArtCommand::Command(packet) => self.handle_text_command(packet, sender, effects),
            ArtCommand::DataRequest(packet) => {
                self.handle_data_request(packet, sender, effects)
            }
            ArtCommand::DataReply(packet) => {
                effects.push(Effect::Callback(NodeEvent::DataReply { packet, sender }))
            }
            ArtCommand::Address(address) => self.handle_address(*address, sender, at, effects),
            ArtCommand::Input(input) => self.handle_input(input, sender, at, effects),
            ArtCommand::IpProg(prog) => self.handle_ip_prog(prog, sender, at, effects),
            ArtCommand::Timecode(packet) => match packet.validate() {
                Ok(()) => {
                    effects.push(Effect::Callback(NodeEvent::Timecode { packet, sender }))
                }
                Err(error) => effects.push(Effect::Log {
                    level: LogLevel::Debug,
                    message: format!("dropping malformed timecode from {}: {}", sender, error),
                }),
            },
            ArtCommand::Trigger(packet) => self.handle_trigger(packet, sender, at, effects),
            ArtCommand::TodRequest(packet) => {
                self.handle_tod_request(packet, sender, at, effects)
            }
            ArtCommand::TodControl(packet) => {
                self.handle_tod_control(packet, sender, at, effects)
            }
            ArtCommand::Rdm(packet) => self.handle_rdm(packet, sender, at, effects),
            ArtCommand::RdmSub(packet) => self.handle_rdm_sub(packet, sender, effects),
            ArtCommand::FirmwareMaster(block) => {
                self.handle_firmware(*block, sender, at, effects)
            }
            ArtCommand::FirmwareReply(packet) => {
                effects.push(Effect::Callback(NodeEvent::FirmwareReply { packet, sender }))
            }
            other => {
                let opcode = other.opcode();
                effects.push(Effect::Callback(NodeEvent::Unhandled {
                    opcode,
                    command: Some(Box::new(other)),
                    sender,
                }));
            }
        }
    }

    fn handle_output(
        &mut self,
        output: Output,
        sender: SocketAddr,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        if output.port_address.is_zero() && !self.warned_zero_address {
            self.warned_zero_address = true;
            effects.push(Effect::Log {
                level: LogLevel::Warn,
                message: format!("{} is using the deprecated Port-Address 0", sender),
            });
        }
        self.discovery.note_sender(sender, at);

        if self.sync.is_buffering() {
            let port_address = output.port_address;
            self.sync.stage(StagedFrame {
                port_address,
                output,
                sender,
                received_at: at,
            });
            return;
        }

        self.output_frame(output, sender, at, false, effects);
    }

    fn output_frame(
        &mut self,
        output: Output,
        sender: SocketAddr,
        at: Instant,
        synced: bool,
        effects: &mut Vec<Effect>,
    ) {
        let port_address = output.port_address;
        let mode = self.merge_mode_for(port_address);
        let key = (sender.ip(), output.physical);
        let outcome = self
            .merge
            .ingest(port_address, key, output.data.as_ref(), at, mode);

        let (data, merged) = match outcome {
            MergeOutcome::Rejected => {
                effects.push(Effect::Log {
                    level: LogLevel::Debug,
                    message: format!(
                        "rejecting third source {} on {}, holding last output",
                        sender, port_address
                    ),
                });
                return;
            }
            MergeOutcome::Passthrough(data) => (data, false),
            MergeOutcome::Merged(data) => (data, true),
        };

        if self.failsafe.clear_playback(port_address).is_some() {
            effects.push(Effect::Log {
                level: LogLevel::Info,
                message: format!("live data returned on {}, failsafe disengaged", port_address),
            });
        }

        self.outputs.insert(
            port_address,
            PortOutput {
                data: data.clone(),
                sequence: output.sequence,
                updated_at: at,
                emitted_at: at,
                sender: Some(sender),
            },
        );

        effects.push(Effect::Callback(NodeEvent::Dmx {
            port_address,
            sequence: output.sequence,
            physical: output.physical,
            data: data.clone(),
            sender: Some(sender),
            synced,
            merged,
            failsafe: None,
        }));
        effects.push(Effect::DmxFrame {
            port_address,
            sequence: output.sequence,
            data,
        });
    }

    fn handle_sync(&mut self, sender: SocketAddr, at: Instant, effects: &mut Vec<Effect>) {
        let ignored = if self.sync.configured() != SyncMode::ArtSync {
            Some(SyncIgnoreReason::NotConfigured)
        } else if self.merge.any_merging() {
            Some(SyncIgnoreReason::MergeActive)
        } else if self.sync.sender_mismatch(sender) {
            Some(SyncIgnoreReason::SenderMismatch)
        } else {
            None
        };

        if let Some(reason) = ignored {
            effects.push(Effect::Callback(NodeEvent::Sync {
                sender,
                released: 0,
                ignored: Some(reason),
            }));
            return;
        }

        let frames = self.sync.release(at);
        let released = frames.len();
        for frame in frames {
            self.output_frame(frame.output, frame.sender, frame.received_at, true, effects);
        }
        effects.push(Effect::Callback(NodeEvent::Sync {
            sender,
            released,
            ignored: None,
        }));
    }

    fn handle_poll(
        &mut self,
        poll: crate::command::Poll,
        sender: SocketAddr,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let demoted = self.discovery.observe_poll(sender, &poll, at);
        for peer in demoted {
            effects.push(Effect::Log {
                level: LogLevel::Info,
                message: format!("reply-on-change subscription of {} demoted by policy", peer),
            });
        }

        if poll.talk_to_me.contains(crate::ArtTalkToMe::ENABLE_DIAGNOSTICS) {
            let unicast = poll.talk_to_me.contains(crate::ArtTalkToMe::UNICAST_DIAGNOSTICS);
            if let Some(edge) =
                self.diagnostics
                    .subscribe(sender, poll.diagnostics_priority, unicast, at)
            {
                push_warning_edge(edge, effects);
            }
        } else if let Some(edge) = self.diagnostics.refresh(at) {
            push_warning_edge(edge, effects);
        }

        let targeted = poll.talk_to_me.contains(crate::ArtTalkToMe::TARGETED_MODE);
        let suppress = poll
            .talk_to_me
            .contains(crate::ArtTalkToMe::SUPPRESS_REPLY_DELAY);
        let (bottom, top) = (*poll.target_port_bottom, *poll.target_port_top);

        for page_index in 0..self.pages.len() {
            if targeted && !page_matches_target(&self.pages[page_index], bottom, top) {
                continue;
            }
            let delay_ms = if suppress {
                0
            } else {
                (self.delay_source)().min(MAX_REPLY_DELAY_MS)
            };
            if delay_ms == 0 {
                let reply = self.build_poll_reply(page_index);
                effects.push(Effect::Tx {
                    command: ArtCommand::PollReply(reply),
                    target: sender,
                });
            } else {
                effects.push(Effect::Schedule {
                    delay: Duration::from_millis(delay_ms),
                    action: ScheduledAction::SendPollReply {
                        target: sender,
                        page: page_index,
                    },
                });
            }
        }
    }

    fn handle_address(
        &mut self,
        address: Address,
        sender: SocketAddr,
        _at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let page_index = match self.page_index_for_bind(address.bind_index) {
            Some(index) => index,
            None => {
                effects.push(Effect::Log {
                    level: LogLevel::Warn,
                    message: format!(
                        "ArtAddress for unknown bind index {} from {}",
                        address.bind_index, sender
                    ),
                });
                return;
            }
        };

        let outcome = programming::apply_address(
            AddressTarget {
                identity: &mut self.identity,
                page: &mut self.pages[page_index],
                failsafe: &mut self.failsafe,
                merge: &mut self.merge,
                rdm: &mut self.rdm,
            },
            &self.defaults,
            &address,
        );

        if outcome.directives.record_scene {
            let frames: Vec<(PortAddress, Vec<u8>)> = self
                .outputs
                .iter()
                .map(|(address, output)| (*address, output.data.clone()))
                .collect();
            for (port_address, data) in frames {
                self.failsafe.record_scene(port_address, data);
            }
        }
        if outcome.directives.flush_sync {
            self.sync.flush();
        }
        if let Some(port_index) = outcome.directives.clear_output {
            let page = &self.pages[page_index];
            if let Some(slot) = page.ports.get(usize::from(port_index)) {
                let port_address = page.output_address(slot);
                self.outputs.remove(&port_address);
                self.merge.clear_port(port_address);
                effects.push(Effect::DmxFrame {
                    port_address,
                    sequence: 0,
                    data: vec![0u8; 512],
                });
            }
        }

        self.sync_rdm_ports();

        if let Some(info) = &outcome.command {
            effects.push(Effect::Log {
                level: if info.applied {
                    LogLevel::Info
                } else {
                    LogLevel::Warn
                },
                message: format!("ArtAddress command from {}: {}", sender, info.description),
            });
            if self.diagnostics.subscriber(sender).is_some() {
                effects.push(Effect::Tx {
                    command: ArtCommand::DiagData(DiagData {
                        diag_priority: info.ack_priority(),
                        data: Text(info.description.clone()),
                        ..DiagData::default()
                    }),
                    target: sender,
                });
            }
        }

        effects.push(Effect::Callback(NodeEvent::Address {
            changes: outcome.changes,
            command: outcome.command,
            sender,
        }));

        self.emit_poll_replies_to(sender, effects);
        self.fan_out_reply_on_change(Some(sender), effects);
    }

    fn handle_input(
        &mut self,
        input: Input,
        sender: SocketAddr,
        _at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let page_index = match self.page_index_for_bind(input.bind_index) {
            Some(index) => index,
            None => return,
        };
        let disabled = input.disabled();
        for (index, slot) in self.pages[page_index].ports.iter_mut().enumerate().take(4) {
            slot.input_disabled = disabled[index];
        }

        effects.push(Effect::Callback(NodeEvent::Input { disabled, sender }));
        self.emit_poll_replies_to(sender, effects);
        self.fan_out_reply_on_change(Some(sender), effects);
    }

    fn handle_ip_prog(
        &mut self,
        prog: IpProg,
        sender: SocketAddr,
        _at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let command = prog.command;
        if command.contains(IpProgCommand::ENABLE) {
            if command.contains(IpProgCommand::RESET_TO_DEFAULT) {
                self.identity.dhcp = false;
                self.identity.netmask = Ipv4Addr::new(255, 0, 0, 0);
                self.identity.gateway = Ipv4Addr::UNSPECIFIED;
                self.identity.udp_port = crate::ARTNET_PORT;
            } else {
                self.identity.dhcp = command.contains(IpProgCommand::DHCP);
                if !self.identity.dhcp {
                    if command.contains(IpProgCommand::PROGRAM_IP) {
                        self.identity.ip = prog.ip;
                    }
                    if command.contains(IpProgCommand::PROGRAM_MASK) {
                        self.identity.netmask = prog.mask;
                    }
                    if command.contains(IpProgCommand::PROGRAM_GATEWAY) {
                        self.identity.gateway = prog.gateway;
                    }
                    if command.contains(IpProgCommand::PROGRAM_PORT) {
                        self.identity.udp_port = *prog.port;
                    }
                }
            }
            effects.push(Effect::Log {
                level: LogLevel::Info,
                message: format!(
                    "network reprogrammed by {}: ip {} mask {} dhcp {}",
                    sender, self.identity.ip, self.identity.netmask, self.identity.dhcp
                ),
            });
        }

        let status = if self.identity.dhcp {
            IP_PROG_STATUS_DHCP
        } else {
            0
        };
        effects.push(Effect::Tx {
            command: ArtCommand::IpProgReply(IpProgReply {
                ip: self.identity.ip,
                mask: self.identity.netmask,
                port: U16Be(self.identity.udp_port),
                gateway: self.identity.gateway,
                status,
                ..IpProgReply::default()
            }),
            target: sender,
        });
        effects.push(Effect::Callback(NodeEvent::IpProg {
            packet: prog,
            sender,
        }));
        self.fan_out_reply_on_change(None, effects);
    }

    fn handle_trigger(
        &mut self,
        trigger: Trigger,
        sender: SocketAddr,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let scope = match trigger::classify(self.identity.oem, &trigger) {
            Some(scope) => scope,
            None => {
                effects.push(Effect::Log {
                    level: LogLevel::Debug,
                    message: format!(
                        "trigger for oem 0x{:04X} ignored, ours is 0x{:04X}",
                        *trigger.oem, self.identity.oem
                    ),
                });
                return;
            }
        };

        if !self.triggers.allow(scope, at) {
            effects.push(Effect::Log {
                level: LogLevel::Debug,
                message: format!("trigger {:?} rate limited", scope),
            });
            return;
        }

        effects.push(Effect::Callback(NodeEvent::Trigger {
            scope,
            payload: trigger.data,
            sender,
        }));
        if self.diagnostics.subscriber(sender).is_some() {
            effects.push(Effect::Tx {
                command: ArtCommand::DiagData(DiagData {
                    diag_priority: programming::ACK_APPLIED,
                    data: Text(format!("Trigger {:?} accepted", scope)),
                    ..DiagData::default()
                }),
                target: sender,
            });
        }
    }

    fn handle_text_command(
        &mut self,
        command: Command,
        sender: SocketAddr,
        effects: &mut Vec<Effect>,
    ) {
        let esta = *command.esta;
        if esta != 0xFFFF && esta != self.identity.esta {
            effects.push(Effect::Log {
                level: LogLevel::Debug,
                message: format!("ArtCommand for esta 0x{:04X} ignored", esta),
            });
            return;
        }

        let directives = command.directives();
        let mut relabelled = false;
        for (key, value) in &directives {
            let label = sanitize_label(value);
            if key.eq_ignore_ascii_case("SwoutText") {
                for page in &mut self.pages {
                    for slot in &mut page.ports {
                        slot.label_out = label.clone();
                    }
                }
                relabelled = true;
            } else if key.eq_ignore_ascii_case("SwinText") {
                for page in &mut self.pages {
                    for slot in &mut page.ports {
                        slot.label_in = label.clone();
                    }
                }
                relabelled = true;
            }
        }
        if relabelled {
            effects.push(Effect::Log {
                level: LogLevel::Info,
                message: format!("port labels updated by {}", sender),
            });
            self.fan_out_reply_on_change(None, effects);
        }

        effects.push(Effect::Callback(NodeEvent::TextCommand { directives, sender }));
    }

    fn handle_data_request(
        &mut self,
        request: DataRequest,
        sender: SocketAddr,
        effects: &mut Vec<Effect>,
    ) {
        let esta = *request.esta;
        let oem = *request.oem;
        if (esta != 0xFFFF && esta != self.identity.esta)
            || (oem != 0xFFFF && oem != self.identity.oem)
        {
            return;
        }
        effects.push(Effect::Tx {
            command: ArtCommand::DataReply(DataReply {
                esta: U16Be(self.identity.esta),
                oem: U16Be(self.identity.oem),
                request: request.request,
                payload: Text::default(),
                ..DataReply::default()
            }),
            target: sender,
        });
    }

    fn handle_tod_request(
        &mut self,
        request: TodRequest,
        sender: SocketAddr,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        self.discovery.note_sender(sender, at);
        let requested = request.port_addresses();
        let matching: Vec<PortAddress> = self
            .rdm
            .ports()
            .filter(|port| port.port_address.net() == (request.net & 0x7F))
            .filter(|port| requested.is_empty() || requested.contains(&port.port_address))
            .map(|port| port.port_address)
            .collect();

        for port_address in matching {
            if let Some(port) = self.rdm.port_mut(port_address) {
                port.last_requester = Some(sender);
            }
            for packet in self.rdm.tod_packets(port_address) {
                effects.push(Effect::Tx {
                    command: ArtCommand::TodData(packet),
                    target: sender,
                });
            }
        }
        effects.push(Effect::Callback(NodeEvent::TodRequest {
            packet: request,
            sender,
        }));
    }

    fn handle_tod_control(
        &mut self,
        control: TodControl,
        sender: SocketAddr,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        let port_address = control.port_address();
        match control.command {
            TodControlCommand::Flush => {
                self.rdm.flush(port_address, at);
                effects.push(Effect::Log {
                    level: LogLevel::Info,
                    message: format!("TOD flush on {}, full discovery queued", port_address),
                });
            }
            TodControlCommand::End => self.rdm.cancel(port_address),
            TodControlCommand::IncOn => {
                if let Some(port) = self.rdm.port_mut(port_address) {
                    port.incremental = true;
                }
            }
            TodControlCommand::IncOff => {
                if let Some(port) = self.rdm.port_mut(port_address) {
                    port.incremental = false;
                }
            }
            TodControlCommand::None | TodControlCommand::Undefined(_) => {}
        }

        // every control is answered with a table snapshot
        for packet in self.rdm.tod_packets(port_address) {
            effects.push(Effect::Tx {
                command: ArtCommand::TodData(packet),
                target: sender,
            });
        }
        effects.push(Effect::Callback(NodeEvent::TodControl {
            packet: control,
            sender,
        }));
    }

    fn handle_rdm(
        &mut self,
        packet: Rdm,
        sender: SocketAddr,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match packet.command_class() {
            Ok(_) => {
                self.discovery.note_sender(sender, at);
                effects.push(Effect::Callback(NodeEvent::Rdm { packet, sender }));
            }
            Err(error) => {
                let dropped = self.rdm.count_dropped();
                effects.push(Effect::Log {
                    level: LogLevel::Debug,
                    message: format!(
                        "dropping RDM from {} ({}), {} dropped so far",
                        sender, error, dropped
                    ),
                });
            }
        }
    }

    fn handle_rdm_sub(&mut self, packet: RdmSub, sender: SocketAddr, effects: &mut Vec<Effect>) {
        if *packet.sub_count == 0 {
            effects.push(Effect::Log {
                level: LogLevel::Debug,
                message: format!("dropping ArtRdmSub from {} with zero sub-count", sender),
            });
            return;
        }
        match packet.expected_payload_len() {
            Some(expected) if packet.data.len() == expected => {
                effects.push(Effect::Callback(NodeEvent::RdmSub { packet, sender }));
            }
            Some(expected) => {
                effects.push(Effect::Log {
                    level: LogLevel::Debug,
                    message: format!(
                        "dropping ArtRdmSub from {}: payload {} bytes, expected {}",
                        sender,
                        packet.data.len(),
                        expected
                    ),
                });
            }
            None => {
                let dropped = self.rdm.count_dropped();
                effects.push(Effect::Log {
                    level: LogLevel::Debug,
                    message: format!(
                        "dropping ArtRdmSub from {} with invalid command class, {} dropped",
                        sender, dropped
                    ),
                });
            }
        }
    }

    fn handle_firmware(
        &mut self,
        block: crate::command::FirmwareMaster,
        sender: SocketAddr,
        at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match self.firmware.handle_block(sender, &block, at) {
            Ok(progress) => {
                let status = match &progress {
                    FirmwareProgress::BlockGood { .. } => FirmwareReplyStatus::BlockGood,
                    FirmwareProgress::AllGood(stats) => {
                        self.report = (
                            NodeReportCode::FirmwareInProgress,
                            format!("Firmware received, {} bytes", stats.received_bytes),
                        );
                        effects.push(Effect::Log {
                            level: LogLevel::Info,
                            message: format!(
                                "firmware upload from {} complete: {} bytes in {} blocks",
                                sender, stats.received_bytes, stats.blocks
                            ),
                        });
                        FirmwareReplyStatus::AllGood
                    }
                };
                effects.push(Effect::Tx {
                    command: ArtCommand::FirmwareReply(FirmwareReply::with_status(status)),
                    target: sender,
                });
                effects.push(Effect::Callback(NodeEvent::Firmware { progress, sender }));
            }
            Err(failure) => {
                self.report = (NodeReportCode::FirmwareFail, failure.to_string());
                effects.push(Effect::Log {
                    level: LogLevel::Warn,
                    message: format!("firmware upload from {} failed: {}", sender, failure),
                });
                effects.push(Effect::Tx {
                    command: ArtCommand::FirmwareReply(FirmwareReply::with_status(
                        FirmwareReplyStatus::Fail,
                    )),
                    target: sender,
                });
            }
        }
    }

    fn handle_tick(&mut self, at: Instant, effects: &mut Vec<Effect>) {
        self.merge.prune(at);

        if self.sync.expire(at) {
            effects.push(Effect::Log {
                level: LogLevel::Info,
                message: "no ArtSync for 4s, reverting to immediate output".to_owned(),
            });
        }

        let failsafe_frames = self.failsafe.sweep(self.outputs.iter(), at);
        for frame in failsafe_frames {
            effects.push(Effect::Log {
                level: LogLevel::Info,
                message: format!(
                    "failsafe {:?} engaged on idle port {}",
                    frame.mode, frame.port_address
                ),
            });
            effects.push(Effect::Callback(NodeEvent::Dmx {
                port_address: frame.port_address,
                sequence: 0,
                physical: 0,
                data: frame.data.clone(),
                sender: None,
                synced: false,
                merged: false,
                failsafe: Some(frame.mode),
            }));
            effects.push(Effect::DmxFrame {
                port_address: frame.port_address,
                sequence: 0,
                data: frame.data,
            });
        }

        for (port_address, output) in self.outputs.iter_mut() {
            if at.duration_since(output.emitted_at) < KEEPALIVE_INTERVAL {
                continue;
            }
            output.emitted_at = at;
            let data = self
                .failsafe
                .playback(*port_address)
                .map(|playback| playback.data.clone())
                .unwrap_or_else(|| output.data.clone());
            effects.push(Effect::DmxFrame {
                port_address: *port_address,
                sequence: output.sequence,
                data,
            });
        }

        if let Some(edge) = self.diagnostics.refresh(at) {
            push_warning_edge(edge, effects);
        }

        let expired = self.firmware.expire(at);
        if expired > 0 {
            effects.push(Effect::Log {
                level: LogLevel::Debug,
                message: format!("{} firmware session(s) timed out", expired),
            });
        }

        if let Some(dispatch) = self.rdm.tick(at) {
            effects.push(Effect::Callback(NodeEvent::RdmDiscovery(dispatch)));
        }
        if let Some(poll) = self.rdm.background_tick(at) {
            effects.push(Effect::Callback(NodeEvent::RdmPoll(poll)));
        }
    }

    fn handle_scheduled(
        &mut self,
        action: ScheduledAction,
        _at: Instant,
        effects: &mut Vec<Effect>,
    ) {
        match action {
            ScheduledAction::SendPollReply { target, page } => {
                if page < self.pages.len() {
                    let reply = self.build_poll_reply(page);
                    effects.push(Effect::Tx {
                        command: ArtCommand::PollReply(reply),
                        target,
                    });
                }
            }
        }
    }

    fn handle_command(&mut self, command: NodeCommand, at: Instant, effects: &mut Vec<Effect>) {
        match command {
            NodeCommand::SendDmx {
                port_address,
                data,
                target,
                physical,
            } => {
                if data.is_empty() || data.len() > 512 {
                    effects.push(Effect::Log {
                        level: LogLevel::Error,
                        message: format!(
                            "send-dmx dropped: {} slots outside 1..=512",
                            data.len()
                        ),
                    });
                    return;
                }
                let sequence = self.next_sequence(port_address);
                effects.push(Effect::Tx {
                    command: ArtCommand::Output(Output {
                        sequence,
                        physical,
                        port_address,
                        data: SlotData::from(data),
                        ..Output::default()
                    }),
                    target,
                });
            }
            NodeCommand::SendRdm {
                port_address,
                data,
                target,
            } => {
                let (net, sub_net, universe) = port_address.split();
                effects.push(Effect::Tx {
                    command: ArtCommand::Rdm(Rdm {
                        net,
                        address: (sub_net << 4) | universe,
                        data,
                        ..Rdm::default()
                    }),
                    target,
                });
            }
            NodeCommand::SendSync => {
                effects.push(Effect::Broadcast {
                    command: ArtCommand::Sync(crate::command::Sync::trigger()),
                });
            }
            NodeCommand::SendPollReply { target } => match target {
                Some(target) => self.emit_poll_replies_to(target, effects),
                None => {
                    for peer in self.discovery.known_peers() {
                        self.emit_poll_replies_to(peer, effects);
                    }
                }
            },
            NodeCommand::SendDiagnostic {
                priority,
                logical_port,
                message,
            } => {
                let targets = match self.diagnostics.targets(priority, at) {
                    Some(targets) => targets,
                    None => {
                        effects.push(Effect::Log {
                            level: LogLevel::Debug,
                            message: "diagnostic suppressed, no subscribers or rate limited"
                                .to_owned(),
                        });
                        return;
                    }
                };
                let packet = DiagData {
                    diag_priority: priority as u8,
                    logical_port,
                    data: Text(message),
                    ..DiagData::default()
                };
                for target in targets.unicast {
                    effects.push(Effect::Tx {
                        command: ArtCommand::DiagData(packet.clone()),
                        target,
                    });
                }
                if targets.broadcast {
                    match self.config.diagnostics.broadcast_target {
                        Some(target) => effects.push(Effect::Tx {
                            command: ArtCommand::DiagData(packet),
                            target,
                        }),
                        None => effects.push(Effect::Broadcast {
                            command: ArtCommand::DiagData(packet),
                        }),
                    }
                }
            }
            NodeCommand::ApplyState(patch) => {
                if let Some(short_name) = patch.short_name {
                    self.identity.short_name = short_name;
                }
                if let Some(long_name) = patch.long_name {
                    self.identity.long_name = long_name;
                }
                if let Some(indicator) = patch.indicator {
                    self.identity.indicator = indicator;
                }
                if let Some(mode) = patch.failsafe_mode {
                    self.failsafe.mode = mode;
                }
                if let Some(policy) = patch.background_queue_policy {
                    self.rdm.background.policy = policy;
                }
                normalize_identity(&mut self.identity);
                effects.push(Effect::Log {
                    level: LogLevel::Info,
                    message: "state patch applied".to_owned(),
                });
                self.fan_out_reply_on_change(None, effects);
            }
            NodeCommand::CompleteRdmDiscovery { port_address, uids } => {
                let found = uids.len();
                if self.rdm.complete_discovery(port_address, uids) {
                    effects.push(Effect::Log {
                        level: LogLevel::Info,
                        message: format!(
                            "RDM discovery on {} complete, {} responder(s)",
                            port_address, found
                        ),
                    });
                    if let Some(requester) =
                        self.rdm.port(port_address).and_then(|port| port.last_requester)
                    {
                        for packet in self.rdm.tod_packets(port_address) {
                            effects.push(Effect::Tx {
                                command: ArtCommand::TodData(packet),
                                target: requester,
                            });
                        }
                    }
                }
            }
            NodeCommand::Stop => {
                self.stopped = true;
                effects.push(Effect::Log {
                    level: LogLevel::Info,
                    message: "node stopping".to_owned(),
                });
                effects.push(Effect::Stopped);
            }
        }
    }

    fn reconfigure(&mut self, config: Config, _at: Instant, effects: &mut Vec<Effect>) {
        if let Err(error) = config.validate() {
            effects.push(Effect::Log {
                level: LogLevel::Error,
                message: format!("configuration replacement refused: {}", error),
            });
            return;
        }

        let ip = self.identity.ip;
        let netmask = self.identity.netmask;
        let mac = self.identity.mac;
        let outputs = std::mem::take(&mut self.outputs);
        let mut replacement = match Node::new(config) {
            Ok((node, _)) => node,
            Err(_) => return,
        };
        replacement.identity.ip = ip;
        replacement.identity.netmask = netmask;
        replacement.identity.mac = mac;
        replacement.outputs = outputs;
        replacement.delay_source = std::mem::replace(&mut self.delay_source, Box::new(|| 0));
        *self = replacement;

        effects.push(Effect::Log {
            level: LogLevel::Info,
            message: "configuration replaced".to_owned(),
        });
        self.fan_out_reply_on_change(None, effects);
    }

    // ---- helpers ----

    fn page_index_for_bind(&self, bind_index: u8) -> Option<usize> {
        let wanted = bind_index.max(1);
        self.pages
            .iter()
            .position(|page| page.bind_index == wanted)
    }

    fn merge_mode_for(&self, port_address: PortAddress) -> MergeMode {
        for page in &self.pages {
            for slot in &page.ports {
                if slot.direction == PortDirection::Output
                    && page.output_address(slot) == port_address
                {
                    return slot.merge_mode;
                }
            }
        }
        MergeMode::Htp
    }

    fn next_sequence(&mut self, port_address: PortAddress) -> u8 {
        let sequence = self.tx_sequences.entry(port_address).or_insert(0);
        *sequence = if *sequence >= 0xFF { 1 } else { *sequence + 1 };
        *sequence
    }

    fn sync_rdm_ports(&mut self) {
        let mut enabled: Vec<(PortAddress, u8, u8)> = Vec::new();
        for page in &self.pages {
            for (index, slot) in page.ports.iter().enumerate() {
                if slot.rdm_enabled {
                    enabled.push((
                        page.output_address(slot),
                        (index + 1) as u8,
                        page.bind_index,
                    ));
                }
            }
        }
        let keep: std::collections::BTreeSet<PortAddress> =
            enabled.iter().map(|(address, _, _)| *address).collect();
        self.rdm.retain_ports(|address| keep.contains(&address));
        for (address, physical, bind_index) in enabled {
            self.rdm.ensure_port(RdmPort::new(address, physical, bind_index));
        }
    }

    fn emit_poll_replies_to(&mut self, target: SocketAddr, effects: &mut Vec<Effect>) {
        for page_index in 0..self.pages.len() {
            let reply = self.build_poll_reply(page_index);
            effects.push(Effect::Tx {
                command: ArtCommand::PollReply(reply),
                target,
            });
        }
    }

    fn fan_out_reply_on_change(
        &mut self,
        exclude: Option<SocketAddr>,
        effects: &mut Vec<Effect>,
    ) {
        let peers: Vec<SocketAddr> = self
            .discovery
            .reply_on_change_peers()
            .into_iter()
            .filter(|peer| Some(*peer) != exclude)
            .collect();
        for peer in peers {
            self.emit_poll_replies_to(peer, effects);
        }
    }

    fn build_poll_reply(&mut self, page_index: usize) -> Box<PollReply> {
        self.poll_reply_count = self.poll_reply_count.wrapping_add(1);
        let caps = DerivedCapabilities {
            rdm_capable: self
                .pages
                .iter()
                .any(|page| page.ports.iter().any(|slot| slot.rdm_enabled)),
            background_queue: self.rdm.background.supported,
            failsafe_capable: self.failsafe.enabled,
            failsafe_mode: self.failsafe.mode,
        };
        let page = &self.pages[page_index];

        let mut port_types = [0u8; 4];
        let mut good_input = [0u8; 4];
        let mut good_output = [0u8; 4];
        let mut good_output_b = [0u8; 4];
        let mut swin = [0u8; 4];
        let mut swout = [0u8; 4];
        for (index, slot) in page.ports.iter().enumerate().take(4) {
            port_types[index] = slot.port_type().bits();
            swin[index] = slot.universe_in & 0x0F;
            swout[index] = slot.universe_out & 0x0F;

            let mut input_status = GoodInput::default();
            if slot.input_disabled {
                input_status |= GoodInput::DISABLED;
            }
            good_input[index] = input_status.bits();

            let port_address = page.output_address(slot);
            let mut output_status = GoodOutputA::default();
            if self.outputs.contains_key(&port_address) {
                output_status |= GoodOutputA::DATA_TRANSMITTED;
            }
            if self.merge.is_merging(port_address) {
                output_status |= GoodOutputA::MERGING;
            }
            if slot.merge_mode == MergeMode::Ltp {
                output_status |= GoodOutputA::MERGE_LTP;
            }
            if slot.protocol == PortProtocol::Sacn {
                output_status |= GoodOutputA::SACN;
            }
            good_output[index] = output_status.bits();

            let mut output_b = 0u8;
            if !slot.rdm_enabled {
                output_b |= 0x80;
            }
            if slot.continuous {
                output_b |= 0x40;
            }
            good_output_b[index] = output_b;
        }

        let report = format_node_report(self.report.0, self.poll_reply_count, &self.report.1);

        Box::new(PollReply {
            address: self.identity.ip,
            port: self.identity.udp_port,
            version: [0, 1],
            net_switch: page.net,
            sub_switch: page.sub_net,
            oem: U16Be(self.identity.oem),
            status_1: state::derive_status1(&self.identity, &caps, &self.overrides),
            esta_code: self.identity.esta,
            short_name: FixedString::new(&self.identity.short_name),
            long_name: FixedString::new(&self.identity.long_name),
            node_report: FixedString::new(&report),
            num_ports: U16Be(page.ports.len() as u16),
            port_types,
            good_input,
            good_output,
            swin,
            swout,
            acn_priority: self.identity.acn_priority,
            style: self.identity.style,
            mac: self.identity.mac,
            bind_ip: self.identity.ip,
            bind_index: page.bind_index,
            status_2: state::derive_status2(&self.identity, &caps, &self.overrides),
            good_output_b,
            status_3: state::derive_status3(&caps, &self.overrides),
            refresh_rate: U16Be(self.identity.refresh_rate),
            background_queue_policy: self.rdm.background.policy,
            ..PollReply::default()
        })
    }
}

fn push_warning_edge(edge: WarningEdge, effects: &mut Vec<Effect>) {
    let (level, message) = match edge {
        WarningEdge::Latched(count) => (
            LogLevel::Warn,
            format!("{} diagnostic subscribers, above the warning threshold", count),
        ),
        WarningEdge::Released(count) => (
            LogLevel::Info,
            format!("diagnostic subscriber count back down to {}", count),
        ),
    };
    effects.push(Effect::Log { level, message });
}

// strip trailing NULs, trim whitespace, cap at 512 characters
fn sanitize_label(value: &str) -> String {
    let mut label = value.trim_end_matches('\0').trim().to_owned();
    label.truncate(512);
    label
}

#[cfg(test)]
mod tests;
