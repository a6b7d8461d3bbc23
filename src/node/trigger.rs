//! ArtTrigger acceptance and rate limiting.

use crate::command::{Trigger, TriggerKey};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Default minimum spacing between identical triggers
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(50);

/// History entries older than this many intervals are pruned
pub const HISTORY_PRUNE_FACTOR: u32 = 16;

/// The wildcard Oem code every node accepts triggers for
pub const OEM_WILDCARD: u16 = 0xFFFF;

/// A trigger classified against this node's Oem code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TriggerScope {
    /// A general trigger, interpreted per the standard key table
    Standard {
        /// The standard key
        key: TriggerKey,
        /// The sub-key the key acts on
        sub_key: u8,
    },
    /// A trigger aimed at this vendor's products; keys are vendor-defined
    Vendor {
        /// The Oem code it was aimed at
        oem: u16,
        /// The raw key byte
        key: u8,
        /// The sub-key
        sub_key: u8,
    },
}

/// Classify a trigger, returning None when it is aimed at somebody else
pub fn classify(node_oem: u16, trigger: &Trigger) -> Option<TriggerScope> {
    let target = *trigger.oem;
    if target == OEM_WILDCARD {
        return Some(TriggerScope::Standard {
            key: trigger.key,
            sub_key: trigger.sub_key,
        });
    }
    if target == node_oem {
        return Some(TriggerScope::Vendor {
            oem: target,
            key: trigger.key.into(),
            sub_key: trigger.sub_key,
        });
    }
    None
}

/// The trigger rate limiter
#[derive(Debug)]
pub struct TriggerEngine {
    min_interval: Duration,
    history: HashMap<TriggerScope, Instant>,
}

impl TriggerEngine {
    /// Build the engine
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            history: HashMap::new(),
        }
    }

    /// Whether this trigger may fire now. Records the firing when allowed.
    pub fn allow(&mut self, scope: TriggerScope, now: Instant) -> bool {
        let prune_age = self.min_interval * HISTORY_PRUNE_FACTOR;
        self.history
            .retain(|_, last| now.duration_since(*last) < prune_age);

        match self.history.get(&scope) {
            Some(last) if now.duration_since(*last) < self.min_interval => false,
            _ => {
                self.history.insert(scope, now);
                true
            }
        }
    }

    /// Number of scopes currently in the history map
    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}
