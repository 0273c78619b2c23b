//! Feed aggregation
//!
//! Maintains the per-peer cache of last successfully pulled messages and
//! merges it with the local store into the unified, time-ordered feed. The
//! aggregator owns no messages beyond this transient cache; every merge is a
//! full recomputation, never a delta.

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use tidepool_core::{FeedError, FeedItem, Message, MessageId, Peer, PeerId, PeerIdentity};

// ----------------------------------------------------------------------------
// Aggregator Statistics
// ----------------------------------------------------------------------------

/// Counters for ingestion outcomes
#[derive(Debug, Clone, Default)]
pub struct AggregatorStats {
    /// Successful pulls cached
    pub pulls_cached: u64,
    /// Remote messages discarded for reusing an id under a different sender
    pub duplicates_discarded: u64,
}

// ----------------------------------------------------------------------------
// Feed Aggregator
// ----------------------------------------------------------------------------

/// Merges local and pulled remote messages into the aggregated feed
#[derive(Debug)]
pub struct FeedAggregator {
    /// This device's identity, the provenance of local feed items
    identity: PeerIdentity,
    /// Last successfully pulled messages per peer; retained across failed
    /// pulls, dropped only when the peer itself is removed
    remote: HashMap<PeerId, Vec<Message>>,
    /// First-seen sender per remote message id, the duplicate defense index
    seen: HashMap<MessageId, PeerId>,
    /// Ids authored locally
    local_ids: HashSet<MessageId>,
    /// Ingestion counters
    stats: AggregatorStats,
}

impl FeedAggregator {
    /// Create an aggregator for the given local identity
    pub fn new(identity: PeerIdentity) -> Self {
        Self {
            identity,
            remote: HashMap::new(),
            seen: HashMap::new(),
            local_ids: HashSet::new(),
            stats: AggregatorStats::default(),
        }
    }

    /// Record a locally authored message so remote collisions against it are
    /// caught on ingestion
    pub fn note_local(&mut self, message: &Message) {
        self.local_ids.insert(message.id.clone());
    }

    /// Cache the result of a successful pull from `from_peer`, replacing the
    /// peer's previous cache entry
    ///
    /// Messages whose id is already held by a different sender are discarded
    /// and logged, never silently overwritten. Returns the accepted
    /// messages.
    pub fn ingest(&mut self, from_peer: &PeerId, messages: Vec<Message>) -> Vec<Message> {
        // The replaced cache entry releases its ids before the new page is
        // screened, so a re-pull of the same peer is never self-colliding.
        if let Some(previous) = self.remote.remove(from_peer) {
            for message in &previous {
                self.seen.remove(&message.id);
            }
        }

        let mut accepted = Vec::with_capacity(messages.len());
        for message in messages {
            if message.id.is_empty() {
                warn!(peer = %from_peer, "discarding remote message with empty id");
                continue;
            }
            if self.local_ids.contains(&message.id) {
                if message.sender_id != self.identity.id {
                    let error = FeedError::DuplicateMessageId {
                        message_id: message.id.clone(),
                        sender_id: message.sender_id.clone(),
                        original_sender_id: self.identity.id.clone(),
                    };
                    warn!(peer = %from_peer, %error, "discarding remote message");
                    self.stats.duplicates_discarded += 1;
                } else {
                    debug!(message_id = %message.id, "skipping echoed local message");
                }
                continue;
            }
            match self.seen.get(&message.id) {
                Some(original_sender) if *original_sender != message.sender_id => {
                    let error = FeedError::DuplicateMessageId {
                        message_id: message.id.clone(),
                        sender_id: message.sender_id.clone(),
                        original_sender_id: original_sender.clone(),
                    };
                    warn!(peer = %from_peer, %error, "discarding remote message");
                    self.stats.duplicates_discarded += 1;
                }
                Some(_) => {
                    debug!(
                        message_id = %message.id,
                        "skipping message already cached from another peer"
                    );
                }
                None => {
                    self.seen
                        .insert(message.id.clone(), message.sender_id.clone());
                    accepted.push(message);
                }
            }
        }

        self.stats.pulls_cached += 1;
        self.remote.insert(from_peer.clone(), accepted.clone());
        accepted
    }

    /// Drop a removed peer's cached messages
    pub fn drop_peer(&mut self, peer_id: &PeerId) {
        if let Some(previous) = self.remote.remove(peer_id) {
            for message in &previous {
                self.seen.remove(&message.id);
            }
            debug!(peer = %peer_id, dropped = previous.len(), "dropped cached peer messages");
        }
    }

    /// Recompute the aggregated feed from the local snapshot plus every
    /// cached pull
    ///
    /// Sorted by timestamp descending; ties break on sender id then message
    /// id so the output is deterministic. Cached messages from peers absent
    /// from the registry snapshot are left out.
    pub fn merge(&self, local: &[Message], peers: &[Peer]) -> Vec<FeedItem> {
        let self_peer = Peer::new(self.identity.id.clone(), self.identity.nickname.clone());
        let by_id: HashMap<&PeerId, &Peer> = peers.iter().map(|p| (&p.id, p)).collect();

        let mut items: Vec<FeedItem> = local
            .iter()
            .map(|message| FeedItem {
                message: message.clone(),
                is_local: true,
                from_peer: self_peer.clone(),
            })
            .collect();

        for (peer_id, messages) in &self.remote {
            let Some(peer) = by_id.get(peer_id) else {
                continue;
            };
            items.extend(messages.iter().map(|message| FeedItem {
                message: message.clone(),
                is_local: false,
                from_peer: (*peer).clone(),
            }));
        }

        items.sort_by(|a, b| {
            b.message
                .timestamp
                .cmp(&a.message.timestamp)
                .then_with(|| a.message.sender_id.cmp(&b.message.sender_id))
                .then_with(|| a.message.id.cmp(&b.message.id))
        });
        items
    }

    /// Cached messages for one peer, if its last pull succeeded
    pub fn cached(&self, peer_id: &PeerId) -> Option<&[Message]> {
        self.remote.get(peer_id).map(Vec::as_slice)
    }

    /// Ingestion counters
    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use tidepool_core::{MessageKind, Timestamp, Ttl};

    fn identity(id: &str) -> PeerIdentity {
        PeerIdentity {
            id: PeerId::new(id),
            nickname: id.to_string(),
        }
    }

    fn message_from(sender: &str, id: &str, millis: i64) -> Message {
        Message {
            id: MessageId::new(id),
            sender_id: PeerId::new(sender),
            sender_nickname: sender.to_string(),
            content: format!("content {id}"),
            kind: MessageKind::Public,
            timestamp: Timestamp::from_millis(millis),
            ttl: Ttl::DEFAULT,
        }
    }

    #[test]
    fn test_merge_orders_and_annotates() {
        let mut aggregator = FeedAggregator::new(identity("self"));
        let peers = vec![Peer::new(PeerId::new("a"), "a")];

        aggregator.ingest(&PeerId::new("a"), vec![message_from("a", "remote-1", 200)]);
        let local = vec![message_from("self", "local-1", 300)];

        let feed = aggregator.merge(&local, &peers);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].message.id.as_str(), "local-1");
        assert!(feed[0].is_local);
        assert_eq!(feed[0].from_peer.id.as_str(), "self");
        assert!(!feed[1].is_local);
        assert_eq!(feed[1].from_peer.id.as_str(), "a");
    }

    #[test]
    fn test_merge_tiebreak_is_deterministic() {
        let mut aggregator = FeedAggregator::new(identity("self"));
        let peers = vec![
            Peer::new(PeerId::new("a"), "a"),
            Peer::new(PeerId::new("b"), "b"),
        ];

        aggregator.ingest(&PeerId::new("b"), vec![message_from("b", "m-b", 100)]);
        aggregator.ingest(&PeerId::new("a"), vec![message_from("a", "m-a", 100)]);

        let feed = aggregator.merge(&[], &peers);
        let ids: Vec<&str> = feed.iter().map(|i| i.message.id.as_str()).collect();
        assert_eq!(ids, vec!["m-a", "m-b"]);
    }

    #[test]
    fn test_cache_replaced_on_repull() {
        let mut aggregator = FeedAggregator::new(identity("self"));
        let peer = PeerId::new("a");

        aggregator.ingest(&peer, vec![message_from("a", "old", 100)]);
        aggregator.ingest(&peer, vec![message_from("a", "new", 200)]);

        let cached = aggregator.cached(&peer).unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].id.as_str(), "new");
    }

    #[test]
    fn test_repull_with_same_ids_is_not_a_collision() {
        let mut aggregator = FeedAggregator::new(identity("self"));
        let peer = PeerId::new("a");

        aggregator.ingest(&peer, vec![message_from("a", "stable", 100)]);
        let accepted = aggregator.ingest(&peer, vec![message_from("a", "stable", 100)]);

        assert_eq!(accepted.len(), 1);
        assert_eq!(aggregator.stats().duplicates_discarded, 0);
    }

    #[test]
    fn test_colliding_id_across_senders_discarded() {
        let mut aggregator = FeedAggregator::new(identity("self"));

        let accepted = aggregator.ingest(&PeerId::new("a"), vec![message_from("a", "shared", 100)]);
        assert_eq!(accepted.len(), 1);

        let accepted = aggregator.ingest(&PeerId::new("b"), vec![message_from("b", "shared", 150)]);
        assert!(accepted.is_empty());
        assert_eq!(aggregator.stats().duplicates_discarded, 1);

        // The first holder keeps the message.
        assert_eq!(aggregator.cached(&PeerId::new("a")).unwrap().len(), 1);
    }

    #[test]
    fn test_collision_with_local_id_discarded() {
        let mut aggregator = FeedAggregator::new(identity("self"));
        let local = message_from("self", "mine", 100);
        aggregator.note_local(&local);

        let accepted = aggregator.ingest(&PeerId::new("a"), vec![message_from("a", "mine", 200)]);
        assert!(accepted.is_empty());
        assert_eq!(aggregator.stats().duplicates_discarded, 1);
    }

    #[test]
    fn test_drop_peer_releases_cache_and_ids() {
        let mut aggregator = FeedAggregator::new(identity("self"));
        let peer = PeerId::new("a");
        aggregator.ingest(&peer, vec![message_from("a", "gone", 100)]);

        aggregator.drop_peer(&peer);
        assert!(aggregator.cached(&peer).is_none());

        // The id is free again after the drop.
        let accepted = aggregator.ingest(&PeerId::new("b"), vec![message_from("b", "gone", 150)]);
        assert_eq!(accepted.len(), 1);
    }

    #[test]
    fn test_merge_skips_unregistered_peers() {
        let mut aggregator = FeedAggregator::new(identity("self"));
        aggregator.ingest(&PeerId::new("ghost"), vec![message_from("ghost", "m", 100)]);

        let feed = aggregator.merge(&[], &[]);
        assert!(feed.is_empty());
    }
}
