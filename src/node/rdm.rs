//! RDM over Art-Net: the per-port Table of Devices, the discovery
//! scheduler, and the background status queue.
//!
//! The node does not speak to DMX hardware itself; discovery and background
//! polls surface as callbacks the application's RDM driver executes,
//! reporting results back through node commands.

use crate::command::{TodData, TOD_DATA_MAX_UIDS, TOD_FULL, TOD_NAK};
use crate::convert::{U16Be, Uid, UidList};
use crate::PortAddress;
use std::collections::{BTreeMap, VecDeque};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Default Port-Addresses per discovery task
pub const DEFAULT_BATCH_SIZE: usize = 64;

/// Default spacing between discovery dispatches
pub const DEFAULT_STEP_DELAY: Duration = Duration::from_millis(50);

/// Default delay before the first dispatch
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_millis(0);

/// Ceiling of the exponential dispatch backoff
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(1);

/// Default background queue poll interval
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Responders polled per background queue round
pub const BG_TARGETS_PER_POLL: usize = 4;

/// Well-known RDM parameter ids the background queue requests
pub mod pid {
    /// STATUS_MESSAGES
    pub const STATUS_MESSAGE: u16 = 0x0030;
    /// QUEUED_MESSAGE
    pub const QUEUED_MESSAGE: u16 = 0x0031;
}

/// The message severity the background queue policy selects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BgSeverity {
    /// Policy 0: do not collect
    None,
    /// Policy 1: advisory and above
    Advisory,
    /// Policy 2: warnings and above
    Warning,
    /// Policy 3: errors only
    Error,
    /// Policies 4..=0x7F: manufacturer defined
    Vendor,
    /// Policies 0x80..=0xDF: reserved by the spec
    Reserved,
    /// Policies 0xE0..=0xFF: queue disabled
    Disabled,
}

/// Map the wire policy byte onto a severity
pub fn severity_from_policy(policy: u8) -> BgSeverity {
    match policy {
        0x00 => BgSeverity::None,
        0x01 => BgSeverity::Advisory,
        0x02 => BgSeverity::Warning,
        0x03 => BgSeverity::Error,
        0x04..=0x7F => BgSeverity::Vendor,
        0x80..=0xDF => BgSeverity::Reserved,
        0xE0..=0xFF => BgSeverity::Disabled,
    }
}

/// The parameter ids a poll at the given severity requests
pub fn pids_for_severity(severity: BgSeverity) -> &'static [u16] {
    match severity {
        BgSeverity::Advisory => &[pid::STATUS_MESSAGE],
        BgSeverity::Warning | BgSeverity::Error => {
            &[pid::STATUS_MESSAGE, pid::QUEUED_MESSAGE]
        }
        BgSeverity::Vendor => &[pid::QUEUED_MESSAGE],
        BgSeverity::None | BgSeverity::Reserved | BgSeverity::Disabled => &[],
    }
}

/// Full re-discovery or incremental refresh
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Rebuild the table from scratch
    Full,
    /// Look for new and lost responders only
    Incremental,
}

/// One queued unit of discovery work
#[derive(Debug, Clone)]
pub struct DiscoveryTask {
    /// Full or incremental
    pub mode: DiscoveryMode,
    /// The Port-Addresses to discover, at most one batch
    pub ports: Vec<PortAddress>,
    /// What scheduled the task, for logging
    pub reason: &'static str,
    /// When it was queued
    pub requested_at: Instant,
}

/// A dispatch the application's RDM driver should execute
#[derive(Debug, Clone)]
pub struct DiscoveryDispatch {
    /// Full or incremental
    pub mode: DiscoveryMode,
    /// The Port-Addresses to walk
    pub ports: Vec<PortAddress>,
}

/// A background queue poll the driver should execute
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundPoll {
    /// The responders to poll this round, at most four
    pub uids: Vec<Uid>,
    /// The parameter ids to request
    pub pids: Vec<u16>,
}

/// RDM state of one port
#[derive(Debug, Clone)]
pub struct RdmPort {
    /// The Port-Address of the port
    pub port_address: PortAddress,
    /// 1-based physical port number
    pub physical: u8,
    /// The bind index of the page carrying the port
    pub bind_index: u8,
    /// The RDM standard version reported in TodData
    pub rdm_version: u8,
    /// The discovered responders
    pub uids: Vec<Uid>,
    /// Whether incremental background discovery is enabled
    pub incremental: bool,
    /// Whether a discovery is currently running
    pub discovering: bool,
    /// The last controller that asked for this port's table
    pub last_requester: Option<SocketAddr>,
}

impl RdmPort {
    /// A fresh port with an empty table
    pub fn new(port_address: PortAddress, physical: u8, bind_index: u8) -> Self {
        Self {
            port_address,
            physical,
            bind_index,
            rdm_version: 1,
            uids: Vec::new(),
            incremental: false,
            discovering: false,
            last_requester: None,
        }
    }
}

/// The background queue state
#[derive(Debug)]
pub struct BackgroundQueue {
    /// Whether the product supports the queue at all
    pub supported: bool,
    /// The raw policy byte, see [severity_from_policy]
    pub policy: u8,
    /// How often to poll
    pub poll_interval: Duration,
    next_poll_at: Option<Instant>,
    cursor: usize,
}

/// The RDM state of the node
#[derive(Debug)]
pub struct RdmEngine {
    ports: BTreeMap<PortAddress, RdmPort>,
    queue: VecDeque<DiscoveryTask>,
    batch_size: usize,
    step_delay: Duration,
    initial_delay: Duration,
    max_backoff: Duration,
    current_delay: Duration,
    next_step_at: Option<Instant>,
    /// The background queue
    pub background: BackgroundQueue,
    dropped_rdm: u64,
}

impl RdmEngine {
    /// Build the engine over the RDM-enabled ports
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ports: impl IntoIterator<Item = RdmPort>,
        batch_size: usize,
        step_delay: Duration,
        initial_delay: Duration,
        max_backoff: Duration,
        bg_supported: bool,
        bg_policy: u8,
        bg_poll_interval: Duration,
    ) -> Self {
        Self {
            ports: ports
                .into_iter()
                .map(|port| (port.port_address, port))
                .collect(),
            queue: VecDeque::new(),
            batch_size: batch_size.max(1),
            step_delay,
            initial_delay,
            max_backoff,
            current_delay: step_delay,
            next_step_at: None,
            background: BackgroundQueue {
                supported: bg_supported,
                policy: bg_policy,
                poll_interval: bg_poll_interval,
                next_poll_at: None,
                cursor: 0,
            },
            dropped_rdm: 0,
        }
    }

    /// The port record for an address
    pub fn port(&self, port_address: PortAddress) -> Option<&RdmPort> {
        self.ports.get(&port_address)
    }

    /// Mutable port record for an address
    pub fn port_mut(&mut self, port_address: PortAddress) -> Option<&mut RdmPort> {
        self.ports.get_mut(&port_address)
    }

    /// Every RDM port, in Port-Address order
    pub fn ports(&self) -> impl Iterator<Item = &RdmPort> {
        self.ports.values()
    }

    /// Count one dropped RDM packet (bad command class or size)
    pub fn count_dropped(&mut self) -> u64 {
        self.dropped_rdm += 1;
        self.dropped_rdm
    }

    /// Add a port if it is not yet tracked, keeping its table if it is
    pub fn ensure_port(&mut self, port: RdmPort) {
        self.ports.entry(port.port_address).or_insert(port);
    }

    /// Drop ports whose Port-Address fails the predicate
    pub fn retain_ports(&mut self, keep: impl Fn(PortAddress) -> bool) {
        self.ports.retain(|address, _| keep(*address));
    }

    /// Queue discovery over the given ports, chunked into batches.
    ///
    /// A full discovery resets the dispatch backoff.
    pub fn schedule_discovery(
        &mut self,
        mode: DiscoveryMode,
        ports: Vec<PortAddress>,
        reason: &'static str,
        now: Instant,
    ) {
        if mode == DiscoveryMode::Full {
            self.current_delay = self.step_delay;
        }
        if self.next_step_at.is_none() {
            self.next_step_at = Some(now + self.initial_delay);
        }
        for chunk in ports.chunks(self.batch_size) {
            self.queue.push_back(DiscoveryTask {
                mode,
                ports: chunk.to_vec(),
                reason,
                requested_at: now,
            });
        }
    }

    /// Flush a port's table and queue a full rediscovery of it
    pub fn flush(&mut self, port_address: PortAddress, now: Instant) {
        if let Some(port) = self.ports.get_mut(&port_address) {
            port.uids.clear();
        }
        self.schedule_discovery(DiscoveryMode::Full, vec![port_address], "tod flush", now);
    }

    /// Cancel discovery on a port and drop its queued tasks
    pub fn cancel(&mut self, port_address: PortAddress) {
        if let Some(port) = self.ports.get_mut(&port_address) {
            port.discovering = false;
        }
        for task in &mut self.queue {
            task.ports.retain(|p| *p != port_address);
        }
        self.queue.retain(|task| !task.ports.is_empty());
    }

    /// Record a finished discovery on a port
    pub fn complete_discovery(&mut self, port_address: PortAddress, uids: Vec<Uid>) -> bool {
        match self.ports.get_mut(&port_address) {
            Some(port) => {
                port.uids = uids;
                port.discovering = false;
                true
            }
            None => false,
        }
    }

    /// Advance the discovery scheduler.
    ///
    /// Dispatches at most one task per call, no sooner than the current
    /// delay allows. Every dispatch doubles the delay up to the ceiling;
    /// full discoveries reset it. With an empty queue, ports that have
    /// incremental discovery enabled re-queue themselves.
    pub fn tick(&mut self, now: Instant) -> Option<DiscoveryDispatch> {
        if self.queue.is_empty() {
            let idle_ports: Vec<PortAddress> = self
                .ports
                .values()
                .filter(|port| port.incremental && !port.discovering)
                .map(|port| port.port_address)
                .collect();
            if !idle_ports.is_empty() {
                self.schedule_discovery(
                    DiscoveryMode::Incremental,
                    idle_ports,
                    "incremental idle",
                    now,
                );
            }
        }

        if self.queue.is_empty() {
            return None;
        }
        if let Some(next_step_at) = self.next_step_at {
            if now < next_step_at {
                return None;
            }
        }

        let task = self.queue.pop_front()?;
        for port_address in &task.ports {
            if let Some(port) = self.ports.get_mut(port_address) {
                port.discovering = true;
            }
        }
        self.next_step_at = Some(now + self.current_delay);
        self.current_delay = (self.current_delay * 2).min(self.max_backoff);

        Some(DiscoveryDispatch {
            mode: task.mode,
            ports: task.ports,
        })
    }

    /// Advance the background queue, producing at most one poll per interval
    pub fn background_tick(&mut self, now: Instant) -> Option<BackgroundPoll> {
        if !self.background.supported {
            return None;
        }
        let severity = severity_from_policy(self.background.policy);
        let pids = pids_for_severity(severity);
        if pids.is_empty() {
            return None;
        }
        if let Some(next_poll_at) = self.background.next_poll_at {
            if now < next_poll_at {
                return None;
            }
        }

        let all_uids: Vec<Uid> = self
            .ports
            .values()
            .flat_map(|port| port.uids.iter().copied())
            .collect();
        if all_uids.is_empty() {
            return None;
        }

        let mut uids = Vec::with_capacity(BG_TARGETS_PER_POLL.min(all_uids.len()));
        for offset in 0..BG_TARGETS_PER_POLL.min(all_uids.len()) {
            uids.push(all_uids[(self.background.cursor + offset) % all_uids.len()]);
        }
        self.background.cursor = (self.background.cursor + uids.len()) % all_uids.len();
        self.background.next_poll_at = Some(now + self.background.poll_interval);

        Some(BackgroundPoll {
            uids,
            pids: pids.to_vec(),
        })
    }

    /// Build the TodData packets answering a request for one port.
    ///
    /// A running discovery answers a single NAK block; otherwise the table
    /// is chunked into blocks of up to 200 UIDs (at least one block, even
    /// when the table is empty).
    pub fn tod_packets(&self, port_address: PortAddress) -> Vec<TodData> {
        let port = match self.ports.get(&port_address) {
            Some(port) => port,
            None => return Vec::new(),
        };
        let (net, sub_net, universe) = port.port_address.split();
        let address = (sub_net << 4) | universe;

        let base = TodData {
            rdm_version: port.rdm_version,
            port: port.physical,
            bind_index: port.bind_index,
            net,
            address,
            uid_total: U16Be(port.uids.len() as u16),
            ..TodData::default()
        };

        if port.discovering {
            return vec![TodData {
                command_response: TOD_NAK,
                block_count: 0,
                uid_count: 0,
                ..base
            }];
        }

        if port.uids.is_empty() {
            return vec![TodData {
                command_response: TOD_FULL,
                block_count: 0,
                uid_count: 0,
                ..base
            }];
        }

        port.uids
            .chunks(TOD_DATA_MAX_UIDS)
            .enumerate()
            .map(|(block, chunk)| TodData {
                command_response: TOD_FULL,
                block_count: block as u8,
                uid_count: chunk.len() as u8,
                tod: UidList(chunk.to_vec()),
                ..base.clone()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uid(n: u8) -> Uid {
        Uid([0x7F, 0xF0, 0, 0, 0, n])
    }

    fn engine_with_port(port: u16) -> RdmEngine {
        RdmEngine::new(
            [RdmPort::new(port.try_into().unwrap(), 1, 1)],
            DEFAULT_BATCH_SIZE,
            DEFAULT_STEP_DELAY,
            DEFAULT_INITIAL_DELAY,
            DEFAULT_MAX_BACKOFF,
            true,
            0x02,
            DEFAULT_POLL_INTERVAL,
        )
    }

    #[test]
    fn severity_covers_the_whole_policy_range() {
        assert_eq!(severity_from_policy(0), BgSeverity::None);
        assert_eq!(severity_from_policy(1), BgSeverity::Advisory);
        assert_eq!(severity_from_policy(2), BgSeverity::Warning);
        assert_eq!(severity_from_policy(3), BgSeverity::Error);
        assert_eq!(severity_from_policy(0x10), BgSeverity::Vendor);
        assert_eq!(severity_from_policy(0x90), BgSeverity::Reserved);
        assert_eq!(severity_from_policy(0xFF), BgSeverity::Disabled);
    }

    #[test]
    fn advisory_asks_for_status_messages_only() {
        assert_eq!(
            pids_for_severity(BgSeverity::Advisory),
            &[pid::STATUS_MESSAGE]
        );
        assert_eq!(
            pids_for_severity(BgSeverity::Warning),
            &[pid::STATUS_MESSAGE, pid::QUEUED_MESSAGE]
        );
        assert!(pids_for_severity(BgSeverity::Disabled).is_empty());
    }

    #[test]
    fn discovery_is_chunked_and_rate_limited() {
        let mut engine = RdmEngine::new(
            [RdmPort::new(1u8.into(), 1, 1)],
            2,
            DEFAULT_STEP_DELAY,
            DEFAULT_INITIAL_DELAY,
            DEFAULT_MAX_BACKOFF,
            false,
            0,
            DEFAULT_POLL_INTERVAL,
        );
        let t0 = Instant::now();
        let ports: Vec<PortAddress> = (1u16..=5).map(|p| p.try_into().unwrap()).collect();
        engine.schedule_discovery(DiscoveryMode::Full, ports, "test", t0);

        let first = engine.tick(t0).unwrap();
        assert_eq!(first.ports.len(), 2);
        // too soon for the next batch
        assert!(engine.tick(t0 + Duration::from_millis(10)).is_none());
        let second = engine.tick(t0 + Duration::from_millis(60)).unwrap();
        assert_eq!(second.ports.len(), 2);
    }

    #[test]
    fn backoff_doubles_up_to_the_ceiling() {
        let mut engine = engine_with_port(1);
        let t0 = Instant::now();
        engine.schedule_discovery(
            DiscoveryMode::Incremental,
            vec![1u8.into()],
            "test",
            t0,
        );
        engine.tick(t0);
        assert_eq!(engine.current_delay, DEFAULT_STEP_DELAY * 2);
        engine.complete_discovery(1u8.into(), vec![]);

        // a full discovery resets the backoff
        engine.schedule_discovery(DiscoveryMode::Full, vec![1u8.into()], "test", t0);
        assert_eq!(engine.current_delay, DEFAULT_STEP_DELAY);
    }

    #[test]
    fn incremental_ports_self_schedule_when_idle() {
        let mut engine = engine_with_port(1);
        engine.port_mut(1u8.into()).unwrap().incremental = true;
        let dispatch = engine.tick(Instant::now()).unwrap();
        assert_eq!(dispatch.mode, DiscoveryMode::Incremental);
        assert_eq!(dispatch.ports, vec![PortAddress::from(1u8)]);
    }

    #[test]
    fn tod_packets_nak_while_discovering() {
        let mut engine = engine_with_port(1);
        engine.port_mut(1u8.into()).unwrap().discovering = true;
        let packets = engine.tod_packets(1u8.into());
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].command_response, TOD_NAK);
    }

    #[test]
    fn large_tables_split_into_200_uid_blocks() {
        let mut engine = engine_with_port(1);
        engine
            .port_mut(1u8.into())
            .unwrap()
            .uids = (0..=255u8).map(uid).cycle().take(250).collect();
        let packets = engine.tod_packets(1u8.into());
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].uid_count, 200);
        assert_eq!(packets[1].uid_count, 50);
        assert_eq!(*packets[0].uid_total, 250);
        assert_eq!(packets[1].block_count, 1);
    }

    #[test]
    fn background_queue_rotates_through_responders() {
        let mut engine = engine_with_port(1);
        engine.port_mut(1u8.into()).unwrap().uids = (1..=6).map(uid).collect();
        let t0 = Instant::now();

        let poll = engine.background_tick(t0).unwrap();
        assert_eq!(poll.uids, vec![uid(1), uid(2), uid(3), uid(4)]);
        assert_eq!(poll.pids, vec![pid::STATUS_MESSAGE, pid::QUEUED_MESSAGE]);

        // inside the interval nothing happens
        assert!(engine.background_tick(t0 + Duration::from_millis(100)).is_none());

        let poll = engine
            .background_tick(t0 + DEFAULT_POLL_INTERVAL)
            .unwrap();
        assert_eq!(poll.uids, vec![uid(5), uid(6), uid(1), uid(2)]);
    }

    #[test]
    fn unsupported_background_queue_stays_silent() {
        let mut engine = RdmEngine::new(
            [RdmPort::new(1u8.into(), 1, 1)],
            DEFAULT_BATCH_SIZE,
            DEFAULT_STEP_DELAY,
            DEFAULT_INITIAL_DELAY,
            DEFAULT_MAX_BACKOFF,
            false,
            0x02,
            DEFAULT_POLL_INTERVAL,
        );
        engine.port_mut(1u8.into()).unwrap().uids = vec![uid(1)];
        assert!(engine.background_tick(Instant::now()).is_none());
    }
}
