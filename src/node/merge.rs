//! HTP/LTP merging of competing DMX sources.
//!
//! Each Port-Address tracks at most two concurrent senders, keyed by
//! `(host, physical port)`. A third sender is rejected outright and the
//! port holds its last output. Sources that go quiet for 10 seconds are
//! evicted.

use crate::PortAddress;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

/// How long a source may stay quiet before it is evicted
pub const SOURCE_TIMEOUT: Duration = Duration::from_secs(10);

/// The most concurrent sources a port will merge
pub const MAX_SOURCES: usize = 2;

/// How two sources are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    /// Highest takes precedence, a pairwise max per slot
    #[default]
    Htp,
    /// Latest takes precedence, the newest frame wins wholesale
    Ltp,
}

/// One sender of DMX data, identified by host and physical input port
pub type SourceKey = (IpAddr, u8);

#[derive(Debug, Clone)]
struct SourceEntry {
    data: Vec<u8>,
    updated_at: Instant,
}

/// What ingesting a frame produced
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// The only active source, the frame passes through unmerged
    Passthrough(Vec<u8>),
    /// Two sources are active, this is their merge
    Merged(Vec<u8>),
    /// A third source tried to join and was turned away
    Rejected,
}

/// Pairwise max of two frames. Slots beyond the shorter frame are taken from
/// the longer one unchanged.
pub fn merge_htp(a: &[u8], b: &[u8]) -> Vec<u8> {
    let common = a.len().min(b.len());
    let mut out = Vec::with_capacity(a.len().max(b.len()));
    for i in 0..common {
        out.push(a[i].max(b[i]));
    }
    let tail = if a.len() > b.len() { &a[common..] } else { &b[common..] };
    out.extend_from_slice(tail);
    out
}

/// The most recently updated frame wins
pub fn merge_ltp(_a: &[u8], b: &[u8]) -> Vec<u8> {
    b.to_vec()
}

/// The source table of a single Port-Address
#[derive(Debug, Default)]
pub struct PortSources {
    sources: HashMap<SourceKey, SourceEntry>,
}

impl PortSources {
    fn prune(&mut self, now: Instant) {
        self.sources
            .retain(|_, entry| now.duration_since(entry.updated_at) < SOURCE_TIMEOUT);
    }

    /// Whether two sources are currently active
    pub fn is_merging(&self) -> bool {
        self.sources.len() >= MAX_SOURCES
    }

    /// Number of active sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Drop every source
    pub fn clear(&mut self) {
        self.sources.clear();
    }

    /// Fold a received frame into the source table
    pub fn ingest(
        &mut self,
        key: SourceKey,
        data: &[u8],
        now: Instant,
        mode: MergeMode,
    ) -> MergeOutcome {
        self.prune(now);

        if !self.sources.contains_key(&key) && self.sources.len() >= MAX_SOURCES {
            return MergeOutcome::Rejected;
        }

        self.sources.insert(
            key,
            SourceEntry {
                data: data.to_vec(),
                updated_at: now,
            },
        );

        if self.sources.len() == 1 {
            return MergeOutcome::Passthrough(data.to_vec());
        }

        let other = self
            .sources
            .iter()
            .find(|(k, _)| **k != key)
            .map(|(_, entry)| entry.data.clone())
            .unwrap_or_default();
        let merged = match mode {
            MergeMode::Htp => merge_htp(&other, data),
            MergeMode::Ltp => merge_ltp(&other, data),
        };
        MergeOutcome::Merged(merged)
    }
}

/// Every port's source table plus the node-wide cancel arm
#[derive(Debug, Default)]
pub struct MergeEngine {
    ports: HashMap<PortAddress, PortSources>,
    cancel_armed: bool,
}

impl MergeEngine {
    /// Arm a one-shot merge cancel; the next ingested frame clears its
    /// port's source table first
    pub fn arm_cancel(&mut self) {
        self.cancel_armed = true;
    }

    /// Whether any port is currently merging two sources
    pub fn any_merging(&self) -> bool {
        self.ports.values().any(PortSources::is_merging)
    }

    /// Whether the given port is merging two sources
    pub fn is_merging(&self, port_address: PortAddress) -> bool {
        self.ports
            .get(&port_address)
            .map(PortSources::is_merging)
            .unwrap_or(false)
    }

    /// Drop the source table of one port
    pub fn clear_port(&mut self, port_address: PortAddress) {
        self.ports.remove(&port_address);
    }

    /// Evict sources that have gone quiet on every port
    pub fn prune(&mut self, now: Instant) {
        for sources in self.ports.values_mut() {
            sources.prune(now);
        }
        self.ports.retain(|_, sources| !sources.is_empty());
    }

    /// Fold a received frame into its port's source table
    pub fn ingest(
        &mut self,
        port_address: PortAddress,
        key: SourceKey,
        data: &[u8],
        now: Instant,
        mode: MergeMode,
    ) -> MergeOutcome {
        let sources = self.ports.entry(port_address).or_default();
        if self.cancel_armed {
            sources.clear();
            self.cancel_armed = false;
        }
        sources.ingest(key, data, now, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(last_octet: u8, physical: u8) -> SourceKey {
        (IpAddr::from([10, 0, 0, last_octet]), physical)
    }

    #[test]
    fn htp_takes_the_pairwise_max() {
        assert_eq!(
            merge_htp(&[100, 0, 50], &[0, 100, 200]),
            vec![100, 100, 200]
        );
    }

    #[test]
    fn htp_keeps_the_longer_tail() {
        assert_eq!(merge_htp(&[1, 2], &[0, 5, 9, 9]), vec![1, 5, 9, 9]);
        assert_eq!(merge_htp(&[0, 5, 9, 9], &[1, 2]), vec![1, 5, 9, 9]);
    }

    #[test]
    fn ltp_takes_the_latest() {
        assert_eq!(merge_ltp(&[1, 2, 3], &[4, 5, 6]), vec![4, 5, 6]);
    }

    #[test]
    fn single_source_passes_through() {
        let mut engine = MergeEngine::default();
        let now = Instant::now();
        let outcome = engine.ingest(1.into(), key(1, 0), &[10, 20], now, MergeMode::Htp);
        assert_eq!(outcome, MergeOutcome::Passthrough(vec![10, 20]));
        assert!(!engine.is_merging(1.into()));
    }

    #[test]
    fn two_sources_merge_htp() {
        let mut engine = MergeEngine::default();
        let now = Instant::now();
        engine.ingest(1.into(), key(1, 0), &[100, 0, 50], now, MergeMode::Htp);
        let outcome = engine.ingest(1.into(), key(2, 0), &[0, 100, 200], now, MergeMode::Htp);
        assert_eq!(outcome, MergeOutcome::Merged(vec![100, 100, 200]));
        assert!(engine.is_merging(1.into()));
    }

    #[test]
    fn third_source_is_rejected() {
        let mut engine = MergeEngine::default();
        let now = Instant::now();
        engine.ingest(1.into(), key(1, 0), &[1], now, MergeMode::Htp);
        engine.ingest(1.into(), key(2, 0), &[2], now, MergeMode::Htp);
        let outcome = engine.ingest(1.into(), key(3, 0), &[3], now, MergeMode::Htp);
        assert_eq!(outcome, MergeOutcome::Rejected);
        // the original two sources are untouched
        assert!(engine.is_merging(1.into()));
    }

    #[test]
    fn same_host_different_physical_ports_are_distinct_sources() {
        let mut engine = MergeEngine::default();
        let now = Instant::now();
        engine.ingest(1.into(), key(1, 0), &[1], now, MergeMode::Htp);
        let outcome = engine.ingest(1.into(), key(1, 1), &[2], now, MergeMode::Htp);
        assert!(matches!(outcome, MergeOutcome::Merged(_)));
    }

    #[test]
    fn quiet_sources_are_evicted_after_ten_seconds() {
        let mut engine = MergeEngine::default();
        let t0 = Instant::now();
        engine.ingest(1.into(), key(1, 0), &[1], t0, MergeMode::Htp);
        engine.ingest(1.into(), key(2, 0), &[2], t0, MergeMode::Htp);

        let later = t0 + SOURCE_TIMEOUT + Duration::from_millis(1);
        // source 2 keeps talking, source 1 went quiet
        let outcome = engine.ingest(1.into(), key(2, 0), &[5], later, MergeMode::Htp);
        assert_eq!(outcome, MergeOutcome::Passthrough(vec![5]));
        // and a new source may now join
        let outcome = engine.ingest(1.into(), key(3, 0), &[9], later, MergeMode::Htp);
        assert!(matches!(outcome, MergeOutcome::Merged(_)));
    }

    #[test]
    fn armed_cancel_clears_the_table_once() {
        let mut engine = MergeEngine::default();
        let now = Instant::now();
        engine.ingest(1.into(), key(1, 0), &[1], now, MergeMode::Htp);
        engine.ingest(1.into(), key(2, 0), &[2], now, MergeMode::Htp);
        engine.arm_cancel();
        let outcome = engine.ingest(1.into(), key(3, 0), &[3], now, MergeMode::Htp);
        assert_eq!(outcome, MergeOutcome::Passthrough(vec![3]));
        assert!(!engine.is_merging(1.into()));
    }

    #[test]
    fn ltp_merge_returns_the_newest_frame() {
        let mut engine = MergeEngine::default();
        let t0 = Instant::now();
        engine.ingest(1.into(), key(1, 0), &[1, 1], t0, MergeMode::Ltp);
        let outcome = engine.ingest(
            1.into(),
            key(2, 0),
            &[2, 2],
            t0 + Duration::from_millis(10),
            MergeMode::Ltp,
        );
        assert_eq!(outcome, MergeOutcome::Merged(vec![2, 2]));
    }
}
