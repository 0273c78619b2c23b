//! Wire payloads for the pull protocol
//!
//! Requests and responses travel as JSON: compact, self-describing, and
//! tolerant of unknown fields on decode so newer peers can add fields
//! without breaking older ones.

use serde::{Deserialize, Serialize};

use crate::types::{Message, PeerId, Timestamp};

/// Page size used when a request does not carry an explicit limit
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

// ----------------------------------------------------------------------------
// Feed Request
// ----------------------------------------------------------------------------

/// A pull request for messages newer than a cursor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedRequest {
    /// Id of the requesting peer
    pub requester_id: PeerId,
    /// Exclusive lower bound on message timestamps; absent means "from the
    /// beginning"
    #[serde(default)]
    pub since: Option<Timestamp>,
    /// Maximum number of messages the responder may return
    #[serde(default = "default_limit")]
    pub limit: u32,
}

impl FeedRequest {
    /// Build a request with the default page limit
    pub fn new(requester_id: PeerId, since: Option<Timestamp>) -> Self {
        Self::with_limit(requester_id, since, DEFAULT_PAGE_LIMIT)
    }

    /// Build a request with an explicit page limit
    pub fn with_limit(requester_id: PeerId, since: Option<Timestamp>, limit: u32) -> Self {
        Self {
            requester_id,
            since,
            limit,
        }
    }

    /// Encode to the wire format
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode from the wire format
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

// ----------------------------------------------------------------------------
// Feed Response
// ----------------------------------------------------------------------------

/// A page of messages returned by the responding peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedResponse {
    /// Matching messages, newest first
    pub messages: Vec<Message>,
    /// Id of the responding peer
    pub peer_id: PeerId,
    /// Pagination heuristic: true iff the returned count hit the requested
    /// limit. A page that coincidentally exhausts the store at exactly
    /// `limit` messages still reports true; the follow-up request returns an
    /// empty page. Both sides rely on the same heuristic, so pagination
    /// terminates.
    pub has_more: bool,
}

impl FeedResponse {
    /// Encode to the wire format
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Decode from the wire format
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
