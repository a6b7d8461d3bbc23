//! Typed node configuration with validation at load.

use super::discovery::{ReplyOnChangePolicy, DEFAULT_REPLY_ON_CHANGE_LIMIT};
use super::failsafe::{FailsafeMode, MIN_TICK_INTERVAL};
use super::merge::MergeMode;
use super::state::{PortDirection, StatusOverrides};
use super::sync::SyncMode;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use thiserror::Error;

/// Why a configuration was refused
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The failsafe tick interval undercuts the 10 ms floor
    #[error("failsafe tick interval {0} ms is below the 10 ms minimum")]
    TickIntervalTooSmall(u64),
    /// A page carries more than four ports
    #[error("page {page} has {ports} ports, the maximum is 4")]
    TooManyPorts {
        /// The offending page index
        page: usize,
        /// How many ports it declared
        ports: usize,
    },
    /// No page carries any port
    #[error("the node declares no ports")]
    NoPorts,
    /// The sACN priority is out of range
    #[error("acn priority {0} is above the maximum of 200")]
    PriorityOutOfRange(u8),
}

/// One port in the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    /// Input or output
    pub direction: PortDirection,
    /// The universe nibble, 0..=15
    pub universe: u8,
    /// HTP or LTP merging
    pub merge_mode: MergeMode,
    /// Whether RDM runs on this port
    pub rdm: bool,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            direction: PortDirection::Output,
            universe: 0,
            merge_mode: MergeMode::Htp,
            rdm: false,
        }
    }
}

/// One page of up to four ports sharing a Net and Sub-Net
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PageConfig {
    /// The 7-bit Net
    pub net: u8,
    /// The 4-bit Sub-Net
    pub sub_net: u8,
    /// The ports, at most 4
    pub ports: Vec<PortConfig>,
}

/// ArtSync behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Immediate output or ArtSync buffering
    pub mode: SyncMode,
    /// Lifetime of a staged frame in milliseconds
    pub buffer_ttl_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::Immediate,
            buffer_ttl_ms: 1000,
        }
    }
}

/// Failsafe behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FailsafeConfig {
    /// Whether failsafe may engage
    pub enabled: bool,
    /// What idle ports output
    pub mode: FailsafeMode,
    /// Idle time before engaging, milliseconds
    pub idle_timeout_ms: u64,
    /// Sweep interval, milliseconds, at least 10
    pub tick_interval_ms: u64,
}

impl Default for FailsafeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: FailsafeMode::Hold,
            idle_timeout_ms: 6000,
            tick_interval_ms: 100,
        }
    }
}

/// Discovery behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Cap on reply-on-change subscribers
    pub reply_on_change_limit: usize,
    /// Who survives when the cap is exceeded
    pub reply_on_change_policy: ReplyOnChangePolicy,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            reply_on_change_limit: DEFAULT_REPLY_ON_CHANGE_LIMIT,
            reply_on_change_policy: ReplyOnChangePolicy::PreferExisting,
        }
    }
}

/// Diagnostics behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Where broadcast diagnostics go; None derives the subnet broadcast
    pub broadcast_target: Option<SocketAddr>,
    /// Subscription lifetime in milliseconds
    pub subscriber_ttl_ms: u64,
    /// Subscriber count above which the node warns
    pub subscriber_warning_threshold: usize,
    /// Optional output rate limit in messages per second
    pub rate_limit_hz: Option<u32>,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            broadcast_target: None,
            subscriber_ttl_ms: 30_000,
            subscriber_warning_threshold: 32,
            rate_limit_hz: None,
        }
    }
}

/// Trigger behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Minimum spacing between identical triggers, milliseconds
    pub min_interval_ms: u64,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self { min_interval_ms: 50 }
    }
}

/// RDM discovery scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RdmDiscoveryConfig {
    /// Port-Addresses per discovery task
    pub batch_size: usize,
    /// Spacing between dispatches, milliseconds
    pub step_delay_ms: u64,
    /// Delay before the first dispatch, milliseconds
    pub initial_delay_ms: u64,
    /// Backoff ceiling, milliseconds
    pub max_backoff_ms: u64,
}

impl Default for RdmDiscoveryConfig {
    fn default() -> Self {
        Self {
            batch_size: 64,
            step_delay_ms: 50,
            initial_delay_ms: 0,
            max_backoff_ms: 1000,
        }
    }
}

/// RDM background queue
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RdmBackgroundConfig {
    /// Whether the queue is supported at all
    pub supported: bool,
    /// The initial policy byte
    pub policy: u8,
    /// Poll interval, milliseconds
    pub poll_interval_ms: u64,
}

impl Default for RdmBackgroundConfig {
    fn default() -> Self {
        Self {
            supported: false,
            policy: 0,
            poll_interval_ms: 500,
        }
    }
}

/// All RDM options
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RdmConfig {
    /// Discovery scheduling
    pub discovery: RdmDiscoveryConfig,
    /// Background queue
    pub background: RdmBackgroundConfig,
}

/// The full node configuration. Every field has a default, so
/// `Config::default()` is a working single-universe output node.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Short name, at most 17 characters
    pub short_name: String,
    /// Long name, at most 63 characters
    pub long_name: String,
    /// The Oem code of this product
    pub oem: u16,
    /// The ESTA manufacturer code; the prototyping code draws a warning
    pub esta: u16,
    /// The style code, 0x00 StNode
    pub style: u8,
    /// Explicit MAC address; None auto-detects from the bound interface
    pub mac: Option<[u8; 6]>,
    /// The address to bind; 0.0.0.0 auto-selects the primary interface,
    /// preferring 2.x then 10.x networks
    pub bind_host: Ipv4Addr,
    /// The UDP port to bind, 6454
    pub bind_port: u16,
    /// The port pages; an empty list gets one default output port
    pub pages: Vec<PageConfig>,
    /// ArtSync behaviour
    pub sync: SyncConfig,
    /// Failsafe behaviour
    pub failsafe: FailsafeConfig,
    /// Discovery behaviour
    pub discovery: DiscoveryConfig,
    /// Diagnostics behaviour
    pub diagnostics: DiagnosticsConfig,
    /// Trigger behaviour
    pub triggers: TriggerConfig,
    /// RDM behaviour
    pub rdm: RdmConfig,
    /// The sACN priority used when ports output sACN
    pub acn_priority: u8,
    /// Explicit status byte overrides
    pub status_overrides: StatusOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            short_name: "artnet-node".to_owned(),
            long_name: "artnet_node Art-Net 4 node".to_owned(),
            oem: 0xFFFF,
            esta: super::state::ESTA_PROTOTYPE,
            style: 0,
            mac: None,
            bind_host: Ipv4Addr::UNSPECIFIED,
            bind_port: crate::ARTNET_PORT,
            pages: vec![PageConfig {
                ports: vec![PortConfig::default()],
                ..PageConfig::default()
            }],
            sync: SyncConfig::default(),
            failsafe: FailsafeConfig::default(),
            discovery: DiscoveryConfig::default(),
            diagnostics: DiagnosticsConfig::default(),
            triggers: TriggerConfig::default(),
            rdm: RdmConfig::default(),
            acn_priority: 100,
            status_overrides: StatusOverrides::default(),
        }
    }
}

impl Config {
    /// Check the configuration against its invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.failsafe.tick_interval_ms < MIN_TICK_INTERVAL.as_millis() as u64 {
            return Err(ConfigError::TickIntervalTooSmall(
                self.failsafe.tick_interval_ms,
            ));
        }
        for (index, page) in self.pages.iter().enumerate() {
            if page.ports.len() > 4 {
                return Err(ConfigError::TooManyPorts {
                    page: index,
                    ports: page.ports.len(),
                });
            }
        }
        if self.pages.iter().all(|page| page.ports.is_empty()) {
            return Err(ConfigError::NoPorts);
        }
        if self.acn_priority > 200 {
            return Err(ConfigError::PriorityOutOfRange(self.acn_priority));
        }
        Ok(())
    }
}
