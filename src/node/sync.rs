//! ArtSync buffering.
//!
//! When the node is configured for synchronous output, incoming ArtDmx
//! frames are staged instead of output, and the next ArtSync releases them
//! together. Four seconds without a trigger falls the node back to
//! immediate mode.

use crate::command::Output;
use crate::PortAddress;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// How long the node waits for an ArtSync before reverting to immediate mode
pub const SYNC_FALLBACK_TIMEOUT: Duration = Duration::from_secs(4);

/// Default lifetime of a staged frame
pub const DEFAULT_BUFFER_TTL: Duration = Duration::from_secs(1);

/// Whether output happens on receipt or on the next ArtSync
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncMode {
    /// Frames are output as they arrive
    #[default]
    Immediate,
    /// Frames are buffered until an ArtSync releases them
    ArtSync,
}

/// A frame waiting for its release trigger
#[derive(Debug, Clone)]
pub struct StagedFrame {
    /// The Port-Address the frame is destined for
    pub port_address: PortAddress,
    /// The frame itself
    pub output: Output,
    /// Who sent it
    pub sender: SocketAddr,
    /// When it was staged
    pub received_at: Instant,
}

/// Why an ArtSync was not acted upon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncIgnoreReason {
    /// The node is not configured for synchronous output
    NotConfigured,
    /// A port is mid-merge; releasing now would reorder the merge
    MergeActive,
    /// The trigger came from a different host than the staged frames
    SenderMismatch,
}

/// The ArtSync state of the node
#[derive(Debug)]
pub struct SyncEngine {
    configured: SyncMode,
    active: SyncMode,
    buffer_ttl: Duration,
    last_sync_at: Option<Instant>,
    waiting_since: Option<Instant>,
    buffer: Vec<StagedFrame>,
}

impl SyncEngine {
    /// Build the engine for the configured mode
    pub fn new(configured: SyncMode, buffer_ttl: Duration) -> Self {
        Self {
            configured,
            active: configured,
            buffer_ttl,
            last_sync_at: None,
            waiting_since: None,
            buffer: Vec::new(),
        }
    }

    /// The mode the operator asked for
    pub fn configured(&self) -> SyncMode {
        self.configured
    }

    /// The mode currently in effect
    pub fn active(&self) -> SyncMode {
        self.active
    }

    /// Replace the configured mode, for live reconfiguration
    pub fn set_configured(&mut self, mode: SyncMode) {
        self.configured = mode;
        self.active = mode;
        if mode == SyncMode::Immediate {
            self.buffer.clear();
            self.waiting_since = None;
        }
    }

    /// Whether incoming frames should be staged rather than output
    pub fn is_buffering(&self) -> bool {
        self.configured == SyncMode::ArtSync && self.active == SyncMode::ArtSync
    }

    /// Number of frames currently staged
    pub fn staged(&self) -> usize {
        self.buffer.len()
    }

    /// Revert to immediate mode if no trigger arrived in time.
    ///
    /// Returns true when the engine reverted on this call.
    pub fn expire(&mut self, now: Instant) -> bool {
        if self.configured != SyncMode::ArtSync || self.active != SyncMode::ArtSync {
            return false;
        }
        let reference = match (self.waiting_since, self.last_sync_at) {
            (Some(w), Some(s)) => Some(w.max(s)),
            (Some(w), None) => Some(w),
            (None, Some(s)) => Some(s),
            (None, None) => None,
        };
        match reference {
            Some(reference) if now.duration_since(reference) >= SYNC_FALLBACK_TIMEOUT => {
                self.active = SyncMode::Immediate;
                self.buffer.clear();
                self.waiting_since = None;
                true
            }
            _ => false,
        }
    }

    /// Stage a frame, replacing any previous frame for the same Port-Address
    pub fn stage(&mut self, frame: StagedFrame) {
        let ttl = self.buffer_ttl;
        let now = frame.received_at;
        self.buffer
            .retain(|staged| now.duration_since(staged.received_at) < ttl);
        self.buffer
            .retain(|staged| staged.port_address != frame.port_address);
        if self.waiting_since.is_none() {
            self.waiting_since = Some(frame.received_at);
        }
        self.buffer.push(frame);
    }

    /// Drop the staged buffer without releasing anything
    pub fn flush(&mut self) {
        self.buffer.clear();
        self.waiting_since = None;
    }

    /// Whether the trigger sender disagrees with any staged frame's sender
    pub fn sender_mismatch(&self, sender: SocketAddr) -> bool {
        self.buffer
            .iter()
            .any(|staged| staged.sender.ip() != sender.ip())
    }

    /// Act on a received ArtSync: reactivate synchronous mode and drain the
    /// staged frames in the order they arrived
    pub fn release(&mut self, now: Instant) -> Vec<StagedFrame> {
        self.active = SyncMode::ArtSync;
        self.last_sync_at = Some(now);
        self.waiting_since = None;
        let ttl = self.buffer_ttl;
        let mut frames: Vec<StagedFrame> = self
            .buffer
            .drain(..)
            .filter(|staged| now.duration_since(staged.received_at) < ttl)
            .collect();
        frames.sort_by_key(|staged| staged.received_at);
        frames
    }
}
