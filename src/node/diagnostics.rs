//! Diagnostic subscribers: who wants ArtDiagData, at what priority, and how
//! fast we may send it.

use crate::command::DiagPriority;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Default lifetime of a subscription without a refreshing poll
pub const DEFAULT_SUBSCRIBER_TTL: Duration = Duration::from_secs(30);

/// Default subscriber count above which the node warns
pub const DEFAULT_WARNING_THRESHOLD: usize = 32;

/// One diagnostics subscriber
#[derive(Debug, Clone)]
pub struct DiagSubscriber {
    /// The lowest priority the subscriber wants to receive
    pub priority: DiagPriority,
    /// Whether messages go unicast to the subscriber rather than broadcast
    pub unicast: bool,
    /// When the subscription was last refreshed
    pub refreshed_at: Instant,
}

/// A warning latch transition produced by a refresh or prune
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningEdge {
    /// The subscriber count just crossed above the threshold
    Latched(usize),
    /// The subscriber count just dropped back below the threshold
    Released(usize),
}

/// Where one diagnostic message should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagTargets {
    /// Subscribers to unicast to
    pub unicast: Vec<SocketAddr>,
    /// Whether at least one broadcast subscriber wants the message
    pub broadcast: bool,
}

/// The diagnostics state of the node
#[derive(Debug)]
pub struct DiagnosticsEngine {
    subscribers: HashMap<SocketAddr, DiagSubscriber>,
    ttl: Duration,
    warning_threshold: usize,
    warning_latched: bool,
    min_interval: Option<Duration>,
    last_emit: Option<Instant>,
}

impl DiagnosticsEngine {
    /// Build the engine. `rate_limit_hz` of zero or None disables limiting.
    pub fn new(ttl: Duration, warning_threshold: usize, rate_limit_hz: Option<u32>) -> Self {
        Self {
            subscribers: HashMap::new(),
            ttl,
            warning_threshold,
            warning_latched: false,
            min_interval: rate_limit_hz
                .filter(|hz| *hz > 0)
                .map(|hz| Duration::from_secs(1) / hz),
            last_emit: None,
        }
    }

    /// Add or refresh a subscriber from a poll's diag-request flag
    pub fn subscribe(
        &mut self,
        addr: SocketAddr,
        priority: u8,
        unicast: bool,
        now: Instant,
    ) -> Option<WarningEdge> {
        self.subscribers.insert(
            addr,
            DiagSubscriber {
                priority: DiagPriority::normalize(priority),
                unicast,
                refreshed_at: now,
            },
        );
        self.refresh(now)
    }

    /// Drop expired subscribers and update the warning latch
    pub fn refresh(&mut self, now: Instant) -> Option<WarningEdge> {
        let ttl = self.ttl;
        self.subscribers
            .retain(|_, subscriber| now.duration_since(subscriber.refreshed_at) < ttl);

        let count = self.subscribers.len();
        if !self.warning_latched && count >= self.warning_threshold {
            self.warning_latched = true;
            Some(WarningEdge::Latched(count))
        } else if self.warning_latched && count < self.warning_threshold {
            self.warning_latched = false;
            Some(WarningEdge::Released(count))
        } else {
            None
        }
    }

    /// The subscriber record for an address, if it is subscribed
    pub fn subscriber(&self, addr: SocketAddr) -> Option<&DiagSubscriber> {
        self.subscribers.get(&addr)
    }

    /// Number of live subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Resolve where a message of the given priority goes.
    ///
    /// Returns None when the rate limit swallows the message. Subscribers
    /// only receive messages at or above the priority they asked for.
    pub fn targets(&mut self, priority: DiagPriority, now: Instant) -> Option<DiagTargets> {
        if let (Some(min_interval), Some(last_emit)) = (self.min_interval, self.last_emit) {
            if now.duration_since(last_emit) < min_interval {
                return None;
            }
        }

        let mut unicast = Vec::new();
        let mut broadcast = false;
        for (addr, subscriber) in &self.subscribers {
            if priority < subscriber.priority {
                continue;
            }
            if subscriber.unicast {
                unicast.push(*addr);
            } else {
                broadcast = true;
            }
        }
        unicast.sort();

        if unicast.is_empty() && !broadcast {
            return None;
        }
        self.last_emit = Some(now);
        Some(DiagTargets { unicast, broadcast })
    }
}
