//! Refresh-progress event stream types

use serde::{Deserialize, Serialize};

use crate::types::{Message, PeerId};

/// Progress of one pull refresh across all known peers
///
/// A refresh emits exactly one `RefreshStarted`, then one `PeerUpdated` or
/// `PeerError` per peer in the registry snapshot taken at refresh start, and
/// always ends with `RefreshComplete`, even when every peer failed. The
/// error is carried as its display string so the event stays `Clone` across
/// broadcast fan-out. Events are never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedUpdate {
    /// A refresh began
    RefreshStarted,
    /// One peer's pull succeeded
    PeerUpdated {
        peer_id: PeerId,
        messages: Vec<Message>,
    },
    /// One peer's pull failed; the refresh continues with the others
    PeerError { peer_id: PeerId, error: String },
    /// All peers in the refresh snapshot have been attempted
    RefreshComplete,
}

impl FeedUpdate {
    /// The peer a per-peer event concerns, if any
    pub fn peer_id(&self) -> Option<&PeerId> {
        match self {
            FeedUpdate::PeerUpdated { peer_id, .. } | FeedUpdate::PeerError { peer_id, .. } => {
                Some(peer_id)
            }
            FeedUpdate::RefreshStarted | FeedUpdate::RefreshComplete => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_accessor() {
        let update = FeedUpdate::PeerError {
            peer_id: PeerId::new("p1"),
            error: "timed out".to_string(),
        };
        assert_eq!(update.peer_id(), Some(&PeerId::new("p1")));
        assert_eq!(FeedUpdate::RefreshStarted.peer_id(), None);
        assert_eq!(FeedUpdate::RefreshComplete.peer_id(), None);
    }
}
