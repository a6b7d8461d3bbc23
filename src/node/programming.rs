//! ArtAddress application: flagged field updates, the one-shot command
//! table, and the acknowledgement text each command produces.
//!
//! Kept apart from packet dispatch so command semantics are testable as a
//! plain function over the node's parts.

use super::failsafe::{FailsafeEngine, FailsafeMode};
use super::merge::{MergeEngine, MergeMode};
use super::rdm::RdmEngine;
use super::state::{normalize_identity, IndicatorState, NodeDefaults, NodeIdentity, PortDirection, PortPage, PortProtocol};
use crate::command::Address;

/// Diagnostics priority of a successful acknowledgement
pub const ACK_APPLIED: u8 = 0x10;

/// Diagnostics priority of a failed acknowledgement
pub const ACK_ERROR: u8 = 0x80;

/// The parsed one-shot command byte of an ArtAddress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressCommand {
    /// 0x01: arm a one-shot merge cancel
    CancelMerge,
    /// 0x02: indicators to normal
    LedNormal,
    /// 0x03: indicators to mute
    LedMute,
    /// 0x04: indicators to locate
    LedLocate,
    /// 0x08: failsafe holds the last frame
    FailsafeHold,
    /// 0x09: failsafe blacks out
    FailsafeZero,
    /// 0x0A: failsafe drives full
    FailsafeFull,
    /// 0x0B: failsafe plays the recorded scene
    FailsafeScene,
    /// 0x0C: record the current output as the failsafe scene
    FailsafeRecord,
    /// 0x10..=0x13: LTP merge for port N
    MergeLtp(u8),
    /// 0x20..=0x23: switch port N to output
    DirectionTx(u8),
    /// 0x30..=0x33: switch port N to input, flushing sync state
    DirectionRx(u8),
    /// 0x50..=0x53: HTP merge for port N
    MergeHtp(u8),
    /// 0x60..=0x63: port N speaks Art-Net
    ProtocolArtNet(u8),
    /// 0x70..=0x73: port N speaks sACN
    ProtocolSacn(u8),
    /// 0x90..=0x93: clear port N's output buffer
    ClearOutput(u8),
    /// 0xA0..=0xA3: port N transmits deltas only
    StyleDelta(u8),
    /// 0xB0..=0xB3: port N re-transmits continuously
    StyleConstant(u8),
    /// 0xC0..=0xC3: enable RDM on port N
    RdmEnable(u8),
    /// 0xD0..=0xD3: disable RDM on port N
    RdmDisable(u8),
    /// 0xE0..=0xEF: set the background queue policy to the low nibble
    BackgroundQueuePolicy(u8),
    /// Anything else
    Unknown(u8),
}

impl AddressCommand {
    /// Decode the command byte
    pub fn parse(byte: u8) -> Option<AddressCommand> {
        Some(match byte {
            0x00 => return None,
            0x01 => AddressCommand::CancelMerge,
            0x02 => AddressCommand::LedNormal,
            0x03 => AddressCommand::LedMute,
            0x04 => AddressCommand::LedLocate,
            0x08 => AddressCommand::FailsafeHold,
            0x09 => AddressCommand::FailsafeZero,
            0x0A => AddressCommand::FailsafeFull,
            0x0B => AddressCommand::FailsafeScene,
            0x0C => AddressCommand::FailsafeRecord,
            0x10..=0x13 => AddressCommand::MergeLtp(byte & 0x03),
            0x20..=0x23 => AddressCommand::DirectionTx(byte & 0x03),
            0x30..=0x33 => AddressCommand::DirectionRx(byte & 0x03),
            0x50..=0x53 => AddressCommand::MergeHtp(byte & 0x03),
            0x60..=0x63 => AddressCommand::ProtocolArtNet(byte & 0x03),
            0x70..=0x73 => AddressCommand::ProtocolSacn(byte & 0x03),
            0x90..=0x93 => AddressCommand::ClearOutput(byte & 0x03),
            0xA0..=0xA3 => AddressCommand::StyleDelta(byte & 0x03),
            0xB0..=0xB3 => AddressCommand::StyleConstant(byte & 0x03),
            0xC0..=0xC3 => AddressCommand::RdmEnable(byte & 0x03),
            0xD0..=0xD3 => AddressCommand::RdmDisable(byte & 0x03),
            0xE0..=0xEF => AddressCommand::BackgroundQueuePolicy(byte & 0x0F),
            other => AddressCommand::Unknown(other),
        })
    }

    /// The port index the command addresses, if it is port-scoped
    pub fn port(&self) -> Option<u8> {
        match self {
            AddressCommand::MergeLtp(n)
            | AddressCommand::DirectionTx(n)
            | AddressCommand::DirectionRx(n)
            | AddressCommand::MergeHtp(n)
            | AddressCommand::ProtocolArtNet(n)
            | AddressCommand::ProtocolSacn(n)
            | AddressCommand::ClearOutput(n)
            | AddressCommand::StyleDelta(n)
            | AddressCommand::StyleConstant(n)
            | AddressCommand::RdmEnable(n)
            | AddressCommand::RdmDisable(n) => Some(*n),
            _ => None,
        }
    }
}

/// One programmed field, for the diff the callback carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldChange {
    /// The field that changed
    pub field: &'static str,
    /// Its new value, rendered
    pub value: String,
}

/// What command executed and how it went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInfo {
    /// The raw command byte
    pub raw: u8,
    /// The parsed command
    pub command: AddressCommand,
    /// The port index the command addressed, if port-scoped
    pub port: Option<u8>,
    /// Whether it was applied
    pub applied: bool,
    /// A human readable acknowledgement
    pub description: String,
}

impl CommandInfo {
    /// The diagnostics priority of the acknowledgement
    pub fn ack_priority(&self) -> u8 {
        if self.applied {
            ACK_APPLIED
        } else {
            ACK_ERROR
        }
    }
}

/// Side effects the caller must execute after the pure application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressDirectives {
    /// Record the current outputs as failsafe scenes
    pub record_scene: bool,
    /// Drop the staged sync buffer
    pub flush_sync: bool,
    /// Clear the output buffer of this port index
    pub clear_output: Option<u8>,
}

/// The result of applying one ArtAddress
#[derive(Debug, Clone, Default)]
pub struct AddressOutcome {
    /// Every field that actually changed
    pub changes: Vec<FieldChange>,
    /// The command that executed, if the byte carried one
    pub command: Option<CommandInfo>,
    /// Work the caller still has to do
    pub directives: AddressDirectives,
}

/// The mutable node parts an ArtAddress may touch
pub struct AddressTarget<'a> {
    /// The node identity
    pub identity: &'a mut NodeIdentity,
    /// The page selected by the packet's bind index
    pub page: &'a mut PortPage,
    /// The failsafe engine, for mode switches and scene recording
    pub failsafe: &'a mut FailsafeEngine,
    /// The merge engine, for cancel arming
    pub merge: &'a mut MergeEngine,
    /// The RDM engine, for the background queue policy
    pub rdm: &'a mut RdmEngine,
}

// byte 0 resets, a set top bit programs the low bits, anything else is
// ignored
fn flagged(byte: u8, mask: u8, current: u8, default: u8) -> Option<u8> {
    let new = if byte == crate::RESET_TO_DEFAULT {
        default
    } else if byte & crate::PROGRAM_BIT != 0 {
        byte & mask
    } else {
        return None;
    };
    (new != current).then_some(new)
}

/// Apply one ArtAddress to the node. Pure over its inputs; the returned
/// directives name the work that involves state outside the target.
pub fn apply_address(
    mut target: AddressTarget<'_>,
    defaults: &NodeDefaults,
    packet: &Address,
) -> AddressOutcome {
    let mut outcome = AddressOutcome::default();

    let new_short = if packet.short_name.0.is_empty() {
        defaults.short_name.clone()
    } else {
        packet.short_name.0.clone()
    };
    if new_short != target.identity.short_name {
        target.identity.short_name = new_short.clone();
        outcome.changes.push(FieldChange {
            field: "short_name",
            value: new_short,
        });
    }

    let new_long = if packet.long_name.0.is_empty() {
        defaults.long_name.clone()
    } else {
        packet.long_name.0.clone()
    };
    if new_long != target.identity.long_name {
        target.identity.long_name = new_long.clone();
        outcome.changes.push(FieldChange {
            field: "long_name",
            value: new_long,
        });
    }

    if let Some(net) = flagged(packet.net_switch, 0x7F, target.page.net, defaults.net) {
        target.page.net = net;
        outcome.changes.push(FieldChange {
            field: "net_switch",
            value: net.to_string(),
        });
    }
    if let Some(sub_net) = flagged(packet.sub_switch, 0x0F, target.page.sub_net, defaults.sub_net) {
        target.page.sub_net = sub_net;
        outcome.changes.push(FieldChange {
            field: "sub_switch",
            value: sub_net.to_string(),
        });
    }

    for (index, slot) in target.page.ports.iter_mut().enumerate().take(4) {
        if let Some(universe) = flagged(
            packet.sw_in[index],
            0x0F,
            slot.universe_in,
            defaults.universes[index],
        ) {
            slot.universe_in = universe;
            outcome.changes.push(FieldChange {
                field: "sw_in",
                value: format!("port {} universe {}", index, universe),
            });
        }
        if let Some(universe) = flagged(
            packet.sw_out[index],
            0x0F,
            slot.universe_out,
            defaults.universes[index],
        ) {
            slot.universe_out = universe;
            outcome.changes.push(FieldChange {
                field: "sw_out",
                value: format!("port {} universe {}", index, universe),
            });
        }
    }

    let new_priority = match packet.acn_priority {
        0 => Some(defaults.acn_priority),
        1..=200 => Some(packet.acn_priority),
        _ => None,
    };
    if let Some(priority) = new_priority {
        if priority != target.identity.acn_priority {
            target.identity.acn_priority = priority;
            outcome.changes.push(FieldChange {
                field: "acn_priority",
                value: priority.to_string(),
            });
        }
    }

    normalize_identity(target.identity);

    if let Some(command) = AddressCommand::parse(packet.command) {
        outcome.command = Some(run_command(
            command,
            packet.command,
            &mut target,
            &mut outcome.directives,
        ));
    }

    outcome
}

fn run_command(
    command: AddressCommand,
    raw: u8,
    target: &mut AddressTarget<'_>,
    directives: &mut AddressDirectives,
) -> CommandInfo {
    let port = command.port();
    let info = |applied: bool, description: String| CommandInfo {
        raw,
        command,
        port,
        applied,
        description,
    };

    if let Some(index) = port {
        if usize::from(index) >= target.page.ports.len() {
            return info(false, format!("Port {} does not exist on this page", index));
        }
    }

    match command {
        AddressCommand::CancelMerge => {
            target.merge.arm_cancel();
            info(true, "Merge cancel armed".to_owned())
        }
        AddressCommand::LedNormal => {
            target.identity.indicator = IndicatorState::Normal;
            info(true, "Indicators set to normal".to_owned())
        }
        AddressCommand::LedMute => {
            target.identity.indicator = IndicatorState::Mute;
            info(true, "Indicators muted".to_owned())
        }
        AddressCommand::LedLocate => {
            target.identity.indicator = IndicatorState::Locate;
            info(true, "Indicators set to locate".to_owned())
        }
        AddressCommand::FailsafeHold => {
            target.failsafe.mode = FailsafeMode::Hold;
            info(true, "Failsafe set to hold".to_owned())
        }
        AddressCommand::FailsafeZero => {
            target.failsafe.mode = FailsafeMode::Zero;
            info(true, "Failsafe set to zero".to_owned())
        }
        AddressCommand::FailsafeFull => {
            target.failsafe.mode = FailsafeMode::Full;
            info(true, "Failsafe set to full".to_owned())
        }
        AddressCommand::FailsafeScene => {
            target.failsafe.mode = FailsafeMode::Scene;
            info(true, "Failsafe set to scene playback".to_owned())
        }
        AddressCommand::FailsafeRecord => {
            directives.record_scene = true;
            info(true, "Failsafe scene recorded".to_owned())
        }
        AddressCommand::MergeLtp(index) => {
            target.page.ports[usize::from(index)].merge_mode = MergeMode::Ltp;
            info(true, format!("Port {} merging LTP", index))
        }
        AddressCommand::MergeHtp(index) => {
            target.page.ports[usize::from(index)].merge_mode = MergeMode::Htp;
            info(true, format!("Port {} merging HTP", index))
        }
        AddressCommand::DirectionTx(index) => {
            target.page.ports[usize::from(index)].direction = PortDirection::Output;
            info(true, format!("Port {} set to output", index))
        }
        AddressCommand::DirectionRx(index) => {
            target.page.ports[usize::from(index)].direction = PortDirection::Input;
            directives.flush_sync = true;
            info(true, format!("Port {} set to input", index))
        }
        AddressCommand::ProtocolArtNet(index) => {
            target.page.ports[usize::from(index)].protocol = PortProtocol::ArtNet;
            info(true, format!("Port {} outputting Art-Net", index))
        }
        AddressCommand::ProtocolSacn(index) => {
            target.page.ports[usize::from(index)].protocol = PortProtocol::Sacn;
            info(true, format!("Port {} outputting sACN", index))
        }
        AddressCommand::ClearOutput(index) => {
            directives.clear_output = Some(index);
            info(true, format!("Port {} output cleared", index))
        }
        AddressCommand::StyleDelta(index) => {
            target.page.ports[usize::from(index)].continuous = false;
            info(true, format!("Port {} transmitting deltas", index))
        }
        AddressCommand::StyleConstant(index) => {
            target.page.ports[usize::from(index)].continuous = true;
            info(true, format!("Port {} transmitting continuously", index))
        }
        AddressCommand::RdmEnable(index) => {
            target.page.ports[usize::from(index)].rdm_enabled = true;
            info(true, format!("RDM enabled on port {}", index))
        }
        AddressCommand::RdmDisable(index) => {
            target.page.ports[usize::from(index)].rdm_enabled = false;
            info(true, format!("RDM disabled on port {}", index))
        }
        AddressCommand::BackgroundQueuePolicy(policy) => {
            if target.rdm.background.supported {
                target.rdm.background.policy = policy;
                info(true, format!("Background queue policy {}", policy))
            } else {
                info(false, "Background queue not supported".to_owned())
            }
        }
        AddressCommand::Unknown(byte) => {
            info(false, format!("Unknown command 0x{:02X}", byte))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Address;
    use crate::convert::FixedString;
    use crate::node::failsafe;
    use crate::node::rdm::{self, RdmEngine, RdmPort};
    use std::time::Duration;

    struct Fixture {
        identity: NodeIdentity,
        page: PortPage,
        failsafe: FailsafeEngine,
        merge: MergeEngine,
        rdm: RdmEngine,
        defaults: NodeDefaults,
    }

    impl Fixture {
        fn new() -> Self {
            let identity = NodeIdentity::default();
            let defaults = NodeDefaults {
                short_name: identity.short_name.clone(),
                long_name: identity.long_name.clone(),
                net: 0,
                sub_net: 0,
                universes: [0, 1, 2, 3],
                acn_priority: identity.acn_priority,
            };
            Self {
                identity,
                page: PortPage {
                    ports: vec![Default::default(), Default::default()],
                    ..PortPage::default()
                },
                failsafe: FailsafeEngine::new(
                    true,
                    FailsafeMode::Hold,
                    failsafe::DEFAULT_IDLE_TIMEOUT,
                    failsafe::DEFAULT_TICK_INTERVAL,
                ),
                merge: MergeEngine::default(),
                rdm: RdmEngine::new(
                    [RdmPort::new(1u8.into(), 1, 1)],
                    rdm::DEFAULT_BATCH_SIZE,
                    rdm::DEFAULT_STEP_DELAY,
                    rdm::DEFAULT_INITIAL_DELAY,
                    rdm::DEFAULT_MAX_BACKOFF,
                    true,
                    0,
                    Duration::from_millis(500),
                ),
                defaults,
            }
        }

        fn apply(&mut self, packet: &Address) -> AddressOutcome {
            apply_address(
                AddressTarget {
                    identity: &mut self.identity,
                    page: &mut self.page,
                    failsafe: &mut self.failsafe,
                    merge: &mut self.merge,
                    rdm: &mut self.rdm,
                },
                &self.defaults,
                packet,
            )
        }
    }

    #[test]
    fn a_no_op_packet_changes_nothing() {
        let mut fixture = Fixture::new();
        let outcome = fixture.apply(&Address::default());
        assert!(outcome.changes.is_empty(), "{:?}", outcome.changes);
        assert!(outcome.command.is_none());
        assert_eq!(outcome.directives, AddressDirectives::default());
    }

    #[test]
    fn programming_the_net_switch_needs_the_top_bit() {
        let mut fixture = Fixture::new();
        // without the program bit the value is ignored
        let outcome = fixture.apply(&Address {
            net_switch: 0x05,
            ..Address::default()
        });
        assert!(outcome.changes.is_empty());
        assert_eq!(fixture.page.net, 0);

        let outcome = fixture.apply(&Address {
            net_switch: 0x85,
            ..Address::default()
        });
        assert_eq!(outcome.changes.len(), 1);
        assert_eq!(fixture.page.net, 5);
    }

    #[test]
    fn zero_resets_to_the_factory_default() {
        let mut fixture = Fixture::new();
        fixture.page.sub_net = 7;
        let outcome = fixture.apply(&Address {
            sub_switch: 0x00,
            ..Address::default()
        });
        assert_eq!(fixture.page.sub_net, 0);
        assert_eq!(outcome.changes[0].field, "sub_switch");
    }

    #[test]
    fn names_program_and_reset() {
        let mut fixture = Fixture::new();
        let outcome = fixture.apply(&Address {
            short_name: FixedString::new("dimmer rack"),
            ..Address::default()
        });
        assert_eq!(fixture.identity.short_name, "dimmer rack");
        assert_eq!(outcome.changes[0].field, "short_name");

        // an empty name falls back to the factory default
        let outcome = fixture.apply(&Address::default());
        assert_eq!(fixture.identity.short_name, fixture.defaults.short_name);
        assert_eq!(outcome.changes[0].field, "short_name");
    }

    #[test]
    fn merge_mode_commands_hit_their_port() {
        let mut fixture = Fixture::new();
        let outcome = fixture.apply(&Address {
            command: 0x11,
            ..Address::default()
        });
        let info = outcome.command.unwrap();
        assert!(info.applied);
        assert_eq!(info.ack_priority(), ACK_APPLIED);
        assert_eq!(fixture.page.ports[1].merge_mode, MergeMode::Ltp);

        let outcome = fixture.apply(&Address {
            command: 0x51,
            ..Address::default()
        });
        assert!(outcome.command.unwrap().applied);
        assert_eq!(fixture.page.ports[1].merge_mode, MergeMode::Htp);
    }

    #[test]
    fn port_scoped_commands_fail_on_missing_ports() {
        let mut fixture = Fixture::new();
        // the fixture page has 2 ports, port index 3 does not exist
        let outcome = fixture.apply(&Address {
            command: 0x13,
            ..Address::default()
        });
        let info = outcome.command.unwrap();
        assert!(!info.applied);
        assert_eq!(info.ack_priority(), ACK_ERROR);
    }

    #[test]
    fn failsafe_commands_reprogram_the_mode() {
        let mut fixture = Fixture::new();
        fixture.apply(&Address {
            command: 0x09,
            ..Address::default()
        });
        assert_eq!(fixture.failsafe.mode, FailsafeMode::Zero);

        let outcome = fixture.apply(&Address {
            command: 0x0C,
            ..Address::default()
        });
        assert!(outcome.directives.record_scene);
    }

    #[test]
    fn direction_rx_flushes_sync() {
        let mut fixture = Fixture::new();
        let outcome = fixture.apply(&Address {
            command: 0x30,
            ..Address::default()
        });
        assert!(outcome.directives.flush_sync);
        assert_eq!(fixture.page.ports[0].direction, PortDirection::Input);
    }

    #[test]
    fn background_queue_policy_takes_the_low_nibble() {
        let mut fixture = Fixture::new();
        let outcome = fixture.apply(&Address {
            command: 0xE3,
            ..Address::default()
        });
        assert!(outcome.command.unwrap().applied);
        assert_eq!(fixture.rdm.background.policy, 3);
    }

    #[test]
    fn unknown_commands_acknowledge_with_an_error() {
        let mut fixture = Fixture::new();
        let outcome = fixture.apply(&Address {
            command: 0x42,
            ..Address::default()
        });
        let info = outcome.command.unwrap();
        assert!(!info.applied);
        assert!(info.description.contains("0x42"));
    }

    #[test]
    fn acn_priority_clamps_and_resets() {
        let mut fixture = Fixture::new();
        fixture.apply(&Address {
            acn_priority: 150,
            ..Address::default()
        });
        assert_eq!(fixture.identity.acn_priority, 150);

        // out of range values are ignored
        fixture.apply(&Address {
            acn_priority: 230,
            ..Address::default()
        });
        assert_eq!(fixture.identity.acn_priority, 150);

        fixture.apply(&Address {
            acn_priority: 0,
            ..Address::default()
        });
        assert_eq!(fixture.identity.acn_priority, fixture.defaults.acn_priority);
    }
}
