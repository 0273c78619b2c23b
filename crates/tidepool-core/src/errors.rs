//! Error types for the Tidepool feed exchange
//!
//! Per-peer transport failures are expected runtime conditions and stay
//! scoped to the peer that caused them; store and registry invariant
//! violations are programming errors and fail loudly.

use crate::types::{MessageId, PeerId};

// ----------------------------------------------------------------------------
// Transport Errors
// ----------------------------------------------------------------------------

/// Failures of a single transport round-trip
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("peer {peer_id} unreachable: {reason}")]
    Unreachable { peer_id: PeerId, reason: String },

    #[error("request to peer {peer_id} timed out after {duration_ms}ms")]
    Timeout { peer_id: PeerId, duration_ms: u64 },

    #[error("transport shut down: {reason}")]
    Shutdown { reason: String },
}

// ----------------------------------------------------------------------------
// Feed Errors
// ----------------------------------------------------------------------------

/// Core error type for the feed exchange
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    /// Message composition rejected at the boundary; nothing is stored
    #[error("invalid message content: {reason}")]
    InvalidContent { reason: String },

    /// A single peer's pull failed; never aborts the surrounding refresh
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// A peer's response failed to decode; treated like an unreachable peer
    #[error("malformed response from peer {peer_id}: {source}")]
    MalformedResponse {
        peer_id: PeerId,
        #[source]
        source: serde_json::Error,
    },

    /// A remote message reused an id already seen from a different sender
    #[error("duplicate message id {message_id} from {sender_id} (already held by {original_sender_id})")]
    DuplicateMessageId {
        message_id: MessageId,
        sender_id: PeerId,
        original_sender_id: PeerId,
    },

    /// Store/registry invariant violation; a programming error, not a
    /// runtime condition
    #[error("invariant violation: {reason}")]
    Invariant { reason: String },

    /// Internal channel wiring failure; unrecoverable for the owning task
    #[error("channel error: {message}")]
    Channel { message: String },

    /// Invalid configuration
    #[error("configuration error: {reason}")]
    Configuration { reason: String },
}

// ----------------------------------------------------------------------------
// Convenience Error Constructors
// ----------------------------------------------------------------------------

impl FeedError {
    /// Create an invalid-content error
    pub fn invalid_content<R: Into<String>>(reason: R) -> Self {
        FeedError::InvalidContent {
            reason: reason.into(),
        }
    }

    /// Create an invariant-violation error
    pub fn invariant<R: Into<String>>(reason: R) -> Self {
        FeedError::Invariant {
            reason: reason.into(),
        }
    }

    /// Create a channel error
    pub fn channel<M: Into<String>>(message: M) -> Self {
        FeedError::Channel {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<R: Into<String>>(reason: R) -> Self {
        FeedError::Configuration {
            reason: reason.into(),
        }
    }

    /// Create an unreachable-peer transport error
    pub fn unreachable<R: Into<String>>(peer_id: PeerId, reason: R) -> Self {
        FeedError::Transport(TransportError::Unreachable {
            peer_id,
            reason: reason.into(),
        })
    }

    /// Create a per-peer timeout transport error
    pub fn timeout(peer_id: PeerId, duration_ms: u64) -> Self {
        FeedError::Transport(TransportError::Timeout {
            peer_id,
            duration_ms,
        })
    }

    /// True if the error is scoped to a single peer's pull and recoverable
    /// by continuing with the remaining peers
    pub fn is_peer_scoped(&self) -> bool {
        matches!(
            self,
            FeedError::Transport(_)
                | FeedError::MalformedResponse { .. }
                | FeedError::DuplicateMessageId { .. }
        )
    }
}

// ----------------------------------------------------------------------------
// Type Aliases
// ----------------------------------------------------------------------------

pub type Result<T> = core::result::Result<T, FeedError>;

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_scoped_classification() {
        let timeout = FeedError::timeout(PeerId::new("p1"), 500);
        assert!(timeout.is_peer_scoped());

        let invariant = FeedError::invariant("empty id");
        assert!(!invariant.is_peer_scoped());

        let channel = FeedError::channel("closed");
        assert!(!channel.is_peer_scoped());
    }

    #[test]
    fn test_display_includes_peer() {
        let err = FeedError::unreachable(PeerId::new("p1"), "no route");
        let text = err.to_string();
        assert!(text.contains("p1"));
        assert!(text.contains("no route"));
    }
}
