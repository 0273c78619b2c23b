//! Local message store
//!
//! Append-only, in-memory for the process lifetime, and exclusively owned by
//! a single writer. The externally observable order is always timestamp
//! descending, with ties broken by insertion order (most recently inserted
//! first). Reads hand out immutable snapshots, never live views.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;

use crate::errors::{FeedError, Result};
use crate::types::{Message, MessageId, Timestamp};

// ----------------------------------------------------------------------------
// Store Statistics
// ----------------------------------------------------------------------------

/// Counters for store activity
#[derive(Debug, Clone, Default)]
pub struct StoreStats {
    /// Messages accepted by `append`
    pub appends: u64,
    /// Appends rejected for invariant violations
    pub rejects: u64,
}

// ----------------------------------------------------------------------------
// Message Store
// ----------------------------------------------------------------------------

/// Ordered store of locally authored messages
#[derive(Debug)]
pub struct MessageStore {
    /// Messages in snapshot order: timestamp descending, newest insert first
    /// among equal timestamps
    messages: Vec<Message>,
    /// Ids present in the store
    ids: HashSet<MessageId>,
    /// Publishes the ordered snapshot after every append
    snapshot_tx: watch::Sender<Arc<[Message]>>,
    /// Activity counters
    stats: StoreStats,
}

impl MessageStore {
    /// Create an empty store
    pub fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(Arc::from(Vec::<Message>::new()));
        Self {
            messages: Vec::new(),
            ids: HashSet::new(),
            snapshot_tx,
            stats: StoreStats::default(),
        }
    }

    /// Append a locally authored message
    ///
    /// An empty message id, an empty sender id, or an id already present are
    /// invariant violations and fail synchronously; nothing is stored and no
    /// snapshot is published.
    pub fn append(&mut self, message: Message) -> Result<()> {
        if message.id.is_empty() {
            self.stats.rejects += 1;
            return Err(FeedError::invariant("message id is empty"));
        }
        if message.sender_id.is_empty() {
            self.stats.rejects += 1;
            return Err(FeedError::invariant("message sender id is empty"));
        }
        if !self.ids.insert(message.id.clone()) {
            self.stats.rejects += 1;
            return Err(FeedError::invariant(format!(
                "message id {} already present in store",
                message.id
            )));
        }

        // First slot at or below the new timestamp; equal-timestamp entries
        // already present stay behind the newer insert.
        let index = self
            .messages
            .partition_point(|m| m.timestamp > message.timestamp);
        self.messages.insert(index, message);
        self.stats.appends += 1;

        let snapshot = self.snapshot();
        debug!(len = snapshot.len(), "local store updated");
        self.snapshot_tx.send_replace(snapshot);
        Ok(())
    }

    /// Messages newer than `since` (exclusive), newest first, at most `limit`
    ///
    /// The second element is the pagination heuristic: true iff the returned
    /// count equals `limit`. Exactly-`limit` matches that exhaust the store
    /// still report true; the follow-up query returns an empty page.
    pub fn query(&self, since: Option<Timestamp>, limit: usize) -> (Vec<Message>, bool) {
        let page: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| match since {
                Some(cursor) => m.timestamp > cursor,
                None => true,
            })
            .take(limit)
            .cloned()
            .collect();
        let has_more = page.len() == limit;
        (page, has_more)
    }

    /// Current full ordered view
    pub fn snapshot(&self) -> Arc<[Message]> {
        Arc::from(self.messages.as_slice())
    }

    /// Subscribe to ordered snapshots published on every append
    pub fn subscribe(&self) -> watch::Receiver<Arc<[Message]>> {
        self.snapshot_tx.subscribe()
    }

    /// Number of stored messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// True if nothing has been stored
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Activity counters
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
