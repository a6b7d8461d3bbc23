//! ArtPoll discovery: the peer table, reply-on-change subscriptions and
//! targeted-mode filtering.

use super::state::PortPage;
use crate::command::Poll;
use crate::{ArtTalkToMe, PortAddress};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

/// Default cap on reply-on-change subscribers
pub const DEFAULT_REPLY_ON_CHANGE_LIMIT: usize = 1;

/// The longest random delay before answering a poll, in milliseconds
pub const MAX_REPLY_DELAY_MS: u64 = 1000;

/// Which subscribers survive when the reply-on-change cap is exceeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplyOnChangePolicy {
    /// The oldest grants survive, newcomers are demoted
    #[default]
    PreferExisting,
    /// The newest grants survive, the oldest are demoted
    PreferLatest,
}

/// Identifies a controller by host and source port
pub type PeerKey = (IpAddr, u16);

/// What the node remembers about one controller
#[derive(Debug, Clone)]
pub struct Peer {
    /// The controller's address
    pub addr: SocketAddr,
    /// When it was first heard from
    pub first_seen: Instant,
    /// When it was last heard from
    pub last_seen: Instant,
    /// Whether it wants unsolicited replies on state change
    pub reply_on_change: bool,
    /// When the reply-on-change subscription was granted
    pub granted_at: Option<Instant>,
    /// Whether it asked for immediate poll replies
    pub suppress_delay: bool,
    /// The raw targeted-mode range `(bottom, top)` from its last poll
    pub target_range: Option<(u16, u16)>,
}

/// The discovery state of the node
#[derive(Debug)]
pub struct DiscoveryEngine {
    peers: HashMap<PeerKey, Peer>,
    limit: usize,
    policy: ReplyOnChangePolicy,
}

impl DiscoveryEngine {
    /// Build the engine
    pub fn new(limit: usize, policy: ReplyOnChangePolicy) -> Self {
        Self {
            peers: HashMap::new(),
            limit,
            policy,
        }
    }

    /// Replace the subscriber cap and policy, for live reconfiguration
    pub fn set_limits(&mut self, limit: usize, policy: ReplyOnChangePolicy) {
        self.limit = limit;
        self.policy = policy;
        enforce_reply_on_change_limit(&mut self.peers, self.limit, self.policy);
    }

    /// Remember a sender without changing its subscriptions
    pub fn note_sender(&mut self, addr: SocketAddr, now: Instant) {
        let peer = self.peers.entry((addr.ip(), addr.port())).or_insert(Peer {
            addr,
            first_seen: now,
            last_seen: now,
            reply_on_change: false,
            granted_at: None,
            suppress_delay: false,
            target_range: None,
        });
        peer.last_seen = now;
    }

    /// Fold a received poll into the peer table.
    ///
    /// Returns the peers demoted by the reply-on-change cap, for logging.
    pub fn observe_poll(&mut self, addr: SocketAddr, poll: &Poll, now: Instant) -> Vec<SocketAddr> {
        let key = (addr.ip(), addr.port());
        let peer = self.peers.entry(key).or_insert(Peer {
            addr,
            first_seen: now,
            last_seen: now,
            reply_on_change: false,
            granted_at: None,
            suppress_delay: false,
            target_range: None,
        });
        peer.last_seen = now;

        peer.suppress_delay = poll
            .talk_to_me
            .contains(ArtTalkToMe::SUPPRESS_REPLY_DELAY);
        peer.target_range = if poll.talk_to_me.contains(ArtTalkToMe::TARGETED_MODE) {
            Some((*poll.target_port_bottom, *poll.target_port_top))
        } else {
            None
        };

        let wants_changes = poll.talk_to_me.contains(ArtTalkToMe::REPLY_ON_CHANGE);
        if wants_changes && !peer.reply_on_change {
            peer.reply_on_change = true;
            peer.granted_at = Some(now);
        } else if !wants_changes && peer.reply_on_change {
            peer.reply_on_change = false;
            peer.granted_at = None;
        }

        let before: Vec<PeerKey> = self
            .peers
            .iter()
            .filter(|(_, p)| p.reply_on_change)
            .map(|(k, _)| *k)
            .collect();
        enforce_reply_on_change_limit(&mut self.peers, self.limit, self.policy);
        before
            .into_iter()
            .filter(|k| !self.peers[k].reply_on_change)
            .map(|k| self.peers[&k].addr)
            .collect()
    }

    /// The peer record for an address, if known
    pub fn peer(&self, addr: SocketAddr) -> Option<&Peer> {
        self.peers.get(&(addr.ip(), addr.port()))
    }

    /// Addresses subscribed to unsolicited replies
    pub fn reply_on_change_peers(&self) -> Vec<SocketAddr> {
        let mut subscribed: Vec<&Peer> = self
            .peers
            .values()
            .filter(|peer| peer.reply_on_change)
            .collect();
        subscribed.sort_by_key(|peer| peer.granted_at);
        subscribed.into_iter().map(|peer| peer.addr).collect()
    }

    /// Every known peer address
    pub fn known_peers(&self) -> Vec<SocketAddr> {
        self.peers.values().map(|peer| peer.addr).collect()
    }

    /// Number of known peers
    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

/// Demote reply-on-change subscribers down to the cap.
///
/// `PreferExisting` keeps the `limit` oldest grants, `PreferLatest` the
/// newest. Demoted peers lose both the flag and their grant timestamp.
pub fn enforce_reply_on_change_limit(
    peers: &mut HashMap<PeerKey, Peer>,
    limit: usize,
    policy: ReplyOnChangePolicy,
) {
    let mut subscribed: Vec<(PeerKey, Instant)> = peers
        .iter()
        .filter(|(_, peer)| peer.reply_on_change)
        .map(|(key, peer)| (*key, peer.granted_at.unwrap_or(peer.first_seen)))
        .collect();
    if subscribed.len() <= limit {
        return;
    }

    subscribed.sort_by_key(|(_, granted_at)| *granted_at);
    if policy == ReplyOnChangePolicy::PreferLatest {
        subscribed.reverse();
    }

    for (key, _) in subscribed.into_iter().skip(limit) {
        if let Some(peer) = peers.get_mut(&key) {
            peer.reply_on_change = false;
            peer.granted_at = None;
        }
    }
}

/// Whether a page answers a targeted poll with the given raw range.
///
/// The range bounds may arrive in either order; a page matches when any of
/// its subscribed Port-Addresses falls inside.
pub fn page_matches_target(page: &PortPage, bottom: u16, top: u16) -> bool {
    let low = bottom.min(top);
    let high = bottom.max(top);
    page.subscribed_addresses()
        .iter()
        .any(|address| (low..=high).contains(&u16::from(*address)))
}
