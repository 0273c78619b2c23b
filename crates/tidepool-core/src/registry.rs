//! Peer registry
//!
//! Tracks the peers this device currently considers reachable. The registry
//! is the exclusive owner of each peer's online flag; other components read
//! snapshots. No automatic expiry: a peer stays registered until the
//! transport's disconnect signal removes it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::types::{Peer, PeerId};

// ----------------------------------------------------------------------------
// Registry Statistics
// ----------------------------------------------------------------------------

/// Counters for registry churn
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Peers added (first registration only, not idempotent re-adds)
    pub peers_added: u64,
    /// Peers removed
    pub peers_removed: u64,
}

// ----------------------------------------------------------------------------
// Peer Registry
// ----------------------------------------------------------------------------

/// Registry of currently known peers
#[derive(Debug)]
pub struct PeerRegistry {
    /// Known peers by id
    peers: HashMap<PeerId, Peer>,
    /// Publishes the peer-list snapshot after every mutation
    snapshot_tx: watch::Sender<Arc<[Peer]>>,
    /// Churn counters
    stats: RegistryStats,
}

impl PeerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::from(Vec::<Peer>::new()));
        Self {
            peers: HashMap::new(),
            snapshot_tx,
            stats: RegistryStats::default(),
        }
    }

    /// Register a peer, idempotent by id
    ///
    /// A re-add refreshes the nickname and marks the peer online. Returns
    /// the resulting peer set.
    pub fn add(&mut self, peer_id: PeerId, nickname: impl Into<String>) -> Vec<Peer> {
        let nickname = nickname.into();
        match self.peers.get_mut(&peer_id) {
            Some(peer) => {
                peer.nickname = nickname;
                peer.is_online = true;
            }
            None => {
                debug!(peer = %peer_id, "peer registered");
                self.peers
                    .insert(peer_id.clone(), Peer::new(peer_id, nickname));
                self.stats.peers_added += 1;
            }
        }
        self.publish();
        self.list()
    }

    /// Remove a peer; no-op if absent
    pub fn remove(&mut self, peer_id: &PeerId) -> Option<Peer> {
        let removed = self.peers.remove(peer_id);
        if removed.is_some() {
            debug!(peer = %peer_id, "peer removed");
            self.stats.peers_removed += 1;
            self.publish();
        }
        removed
    }

    /// Flip a peer's online flag; returns false if the peer is unknown
    pub fn set_online(&mut self, peer_id: &PeerId, online: bool) -> bool {
        match self.peers.get_mut(peer_id) {
            Some(peer) if peer.is_online != online => {
                peer.is_online = online;
                self.publish();
                true
            }
            Some(_) => true,
            None => false,
        }
    }

    /// Look up a single peer
    pub fn get(&self, peer_id: &PeerId) -> Option<&Peer> {
        self.peers.get(peer_id)
    }

    /// Current peer set, ordered by id for deterministic snapshots
    pub fn list(&self) -> Vec<Peer> {
        let mut peers: Vec<Peer> = self.peers.values().cloned().collect();
        peers.sort_by(|a, b| a.id.cmp(&b.id));
        peers
    }

    /// Subscribe to peer-list snapshots
    pub fn subscribe(&self) -> watch::Receiver<Arc<[Peer]>> {
        self.snapshot_tx.subscribe()
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// True if no peers are registered
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Churn counters
    pub fn stats(&self) -> &RegistryStats {
        &self.stats
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(Arc::from(self.list()));
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
