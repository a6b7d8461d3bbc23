//! The node's identity and port layout, and the status bits derived from
//! them.
//!
//! Derived bits (DHCP active, background queue capable, failsafe capable)
//! are recomputed from live state on every reply; explicit status overrides
//! from the configuration always win over derivation.

use super::failsafe::FailsafeMode;
use super::merge::MergeMode;
use crate::{PortAddress, PortType, Status1, Status2, Status3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Instant;

/// The ESTA prototyping manufacturer code nodes ship with until assigned one
pub const ESTA_PROTOTYPE: u16 = 0x7FF0;

/// The front panel indicator state, reported in the top bits of Status1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndicatorState {
    /// Indicators operate normally
    #[default]
    Normal,
    /// Indicators are off
    Mute,
    /// Indicators flash to help find the device
    Locate,
}

impl IndicatorState {
    fn status_bits(self) -> Status1 {
        match self {
            IndicatorState::Normal => Status1::INDICATOR_LOCATE | Status1::INDICATOR_MUTE,
            IndicatorState::Mute => Status1::INDICATOR_MUTE,
            IndicatorState::Locate => Status1::INDICATOR_LOCATE,
        }
    }
}

/// Which way a port moves DMX data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    /// The port drives a DMX line from network data
    #[default]
    Output,
    /// The port feeds DMX from the wire onto the network
    Input,
}

/// Which protocol a port speaks on the network side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    /// Art-Net, the native protocol
    #[default]
    ArtNet,
    /// Streaming ACN
    Sacn,
}

/// One of the up to four ports of a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortSlot {
    /// Input or output
    pub direction: PortDirection,
    /// The universe nibble used when the port outputs
    pub universe_out: u8,
    /// The universe nibble used when the port inputs
    pub universe_in: u8,
    /// How competing sources are combined
    pub merge_mode: MergeMode,
    /// Art-Net or sACN on the network side
    pub protocol: PortProtocol,
    /// Whether the output is enabled
    pub output_enabled: bool,
    /// Whether the input has been disabled via ArtInput
    pub input_disabled: bool,
    /// Whether RDM is enabled on this port
    pub rdm_enabled: bool,
    /// Continuous re-transmission rather than delta transmission
    pub continuous: bool,
    /// Operator label for the output, set via ArtCommand SwoutText
    pub label_out: String,
    /// Operator label for the input, set via ArtCommand SwinText
    pub label_in: String,
}

impl Default for PortSlot {
    fn default() -> Self {
        Self {
            direction: PortDirection::Output,
            universe_out: 0,
            universe_in: 0,
            merge_mode: MergeMode::Htp,
            protocol: PortProtocol::ArtNet,
            output_enabled: true,
            input_disabled: false,
            rdm_enabled: false,
            continuous: false,
            label_out: String::new(),
            label_in: String::new(),
        }
    }
}

impl PortSlot {
    /// The PortTypes byte for this slot
    pub fn port_type(&self) -> PortType {
        match self.direction {
            PortDirection::Output => PortType::OUTPUT,
            PortDirection::Input => PortType::INPUT,
        }
    }
}

/// A logical group of up to 4 ports sharing a Net and Sub-Net.
///
/// Nodes with more than 4 ports expose several pages with distinct
/// bind indices; discovery lists every page separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortPage {
    /// 1-based page identifier
    pub bind_index: u8,
    /// The 7-bit Net of every port on this page
    pub net: u8,
    /// The 4-bit Sub-Net of every port on this page
    pub sub_net: u8,
    /// The ports themselves, at most 4
    pub ports: Vec<PortSlot>,
    /// Explicit Port-Address list overriding the computed one, used for
    /// targeted-mode matching
    pub port_addresses: Option<BTreeSet<PortAddress>>,
}

impl Default for PortPage {
    fn default() -> Self {
        Self {
            bind_index: 1,
            net: 0,
            sub_net: 0,
            ports: vec![PortSlot::default()],
            port_addresses: None,
        }
    }
}

impl PortPage {
    /// Every Port-Address this page subscribes to. The explicit list wins
    /// when present, otherwise the addresses are computed from the port
    /// directions and universe nibbles.
    pub fn subscribed_addresses(&self) -> BTreeSet<PortAddress> {
        if let Some(explicit) = &self.port_addresses {
            return explicit.clone();
        }
        self.ports
            .iter()
            .map(|slot| {
                let universe = match slot.direction {
                    PortDirection::Output => slot.universe_out,
                    PortDirection::Input => slot.universe_in,
                };
                PortAddress::compose(self.net, self.sub_net, universe)
            })
            .collect()
    }

    /// The Port-Address the given slot outputs on
    pub fn output_address(&self, slot: &PortSlot) -> PortAddress {
        PortAddress::compose(self.net, self.sub_net, slot.universe_out)
    }
}

/// The node's own identity, the bulk of what an ArtPollReply carries
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeIdentity {
    /// The node's IP address
    pub ip: Ipv4Addr,
    /// The node's subnet mask
    pub netmask: Ipv4Addr,
    /// The node's default gateway
    pub gateway: Ipv4Addr,
    /// Whether the address came from DHCP
    pub dhcp: bool,
    /// The UDP port the node listens on
    pub udp_port: u16,
    /// The node's MAC address, zero when unknown
    pub mac: [u8; 6],
    /// Short name, at most 17 characters
    pub short_name: String,
    /// Long name, at most 63 characters
    pub long_name: String,
    /// The Oem code of this product
    pub oem: u16,
    /// The ESTA manufacturer code, [ESTA_PROTOTYPE] until assigned
    pub esta: u16,
    /// The style code, 0x00 StNode
    pub style: u8,
    /// The sACN priority used when ports output sACN
    pub acn_priority: u8,
    /// Front panel indicator state
    pub indicator: IndicatorState,
    /// Maximum DMX refresh rate in Hz, 0 for the standard 44 Hz
    pub refresh_rate: u16,
}

impl Default for NodeIdentity {
    fn default() -> Self {
        Self {
            ip: Ipv4Addr::UNSPECIFIED,
            netmask: Ipv4Addr::new(255, 0, 0, 0),
            gateway: Ipv4Addr::UNSPECIFIED,
            dhcp: false,
            udp_port: crate::ARTNET_PORT,
            mac: [0; 6],
            short_name: "artnet-node".to_owned(),
            long_name: "artnet_node Art-Net 4 node".to_owned(),
            oem: 0xFFFF,
            esta: ESTA_PROTOTYPE,
            style: 0,
            acn_priority: 100,
            indicator: IndicatorState::Normal,
            refresh_rate: 0,
        }
    }
}

/// Clamp identity fields to their wire widths. Idempotent.
pub fn normalize_identity(identity: &mut NodeIdentity) {
    identity.short_name.retain(|c| c.is_ascii() && c != '\0');
    identity.long_name.retain(|c| c.is_ascii() && c != '\0');
    identity.short_name.truncate(17);
    identity.long_name.truncate(63);
    if identity.acn_priority > 200 {
        identity.acn_priority = 200;
    }
}

/// The factory defaults ArtAddress resets fields back to
#[derive(Debug, Clone, Default)]
pub struct NodeDefaults {
    /// Default short name
    pub short_name: String,
    /// Default long name
    pub long_name: String,
    /// Default Net per page, by page position
    pub net: u8,
    /// Default Sub-Net per page
    pub sub_net: u8,
    /// Default universe nibbles, by port position
    pub universes: [u8; 4],
    /// Default sACN priority
    pub acn_priority: u8,
}

/// Explicit status byte overrides from the configuration; a set byte
/// replaces the derived register wholesale
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusOverrides {
    /// Replaces the derived Status1
    pub status1: Option<u8>,
    /// Replaces the derived Status2
    pub status2: Option<u8>,
    /// Replaces the derived Status3
    pub status3: Option<u8>,
}

/// Inputs to status derivation that live outside the identity
#[derive(Debug, Clone, Copy, Default)]
pub struct DerivedCapabilities {
    /// Any port has RDM enabled
    pub rdm_capable: bool,
    /// The RDM background queue is supported
    pub background_queue: bool,
    /// Failsafe playback is available
    pub failsafe_capable: bool,
    /// The failsafe mode bits to report
    pub failsafe_mode: FailsafeMode,
}

/// Derive the Status1 register
pub fn derive_status1(identity: &NodeIdentity, caps: &DerivedCapabilities, overrides: &StatusOverrides) -> u8 {
    if let Some(explicit) = overrides.status1 {
        return explicit;
    }
    let mut status = Status1::ADDRESS_NETWORK | identity.indicator.status_bits();
    if caps.rdm_capable {
        status |= Status1::RDM_CAPABLE;
    }
    status.bits()
}

/// Derive the Status2 register
pub fn derive_status2(identity: &NodeIdentity, caps: &DerivedCapabilities, overrides: &StatusOverrides) -> u8 {
    if let Some(explicit) = overrides.status2 {
        return explicit;
    }
    let mut status = Status2::DHCP_CAPABLE | Status2::PORT_ADDRESS_15BIT | Status2::SACN_SWITCHABLE;
    if identity.dhcp {
        status |= Status2::DHCP_ACTIVE;
    }
    if caps.background_queue {
        status |= Status2::BACKGROUND_QUEUE;
    }
    status.bits()
}

/// Derive the Status3 register, failsafe mode bits included
pub fn derive_status3(caps: &DerivedCapabilities, overrides: &StatusOverrides) -> u8 {
    if let Some(explicit) = overrides.status3 {
        return explicit;
    }
    let mut status = Status3::OUTPUT_SWITCHABLE;
    if caps.failsafe_capable {
        status |= Status3::FAILSAFE_CAPABLE;
    }
    status.with_failsafe_bits(caps.failsafe_mode.status_bits())
}

/// Node report status codes, the `#xxxx` of the report string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum NodeReportCode {
    /// Power on and tests passed
    PowerOk = 0x0001,
    /// A packet failed to parse
    ParseFail = 0x0004,
    /// Firmware upload in progress
    FirmwareInProgress = 0x0006,
    /// Firmware upload failed
    FirmwareFail = 0x0007,
}

/// Format the ArtPollReply node report, `#xxxx [yyyy] text`
pub fn format_node_report(code: NodeReportCode, counter: u32, text: &str) -> String {
    let mut report = format!("#{:04x} [{}] {}", code as u16, counter % 10_000, text);
    report.truncate(63);
    report
}

/// The last frame output on a port, what failsafe and keep-alive feed on
#[derive(Debug, Clone)]
pub struct PortOutput {
    /// The slot data last output
    pub data: Vec<u8>,
    /// The sequence number it carried
    pub sequence: u8,
    /// When data last arrived for this port
    pub updated_at: Instant,
    /// When the port last physically emitted, for the keep-alive window
    pub emitted_at: Instant,
    /// Who the data came from, None for operator-injected frames
    pub sender: Option<SocketAddr>,
}
