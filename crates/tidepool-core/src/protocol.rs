//! Pull protocol: one request/response exchange per peer
//!
//! The responder side answers a [`FeedRequest`] from its own local store;
//! the requester side drives one timeout-bounded round-trip. A pull is
//! terminal once it resolves; retries, if any, belong to the refresh
//! orchestration above this layer.

use std::time::Duration;

use tracing::{debug, warn};

use crate::errors::{FeedError, Result};
use crate::store::MessageStore;
use crate::transport::FeedTransport;
use crate::types::{Message, PeerId, PeerIdentity};
use crate::wire::{FeedRequest, FeedResponse};

// ----------------------------------------------------------------------------
// Responder Side
// ----------------------------------------------------------------------------

/// Answer a pull request against the local store
///
/// Filters to messages newer than the request cursor, newest first, capped
/// at the requested limit; `has_more` follows the store's pagination
/// heuristic so both ends of the exchange agree on it.
pub fn handle_request(
    store: &MessageStore,
    identity: &PeerIdentity,
    request: &FeedRequest,
) -> FeedResponse {
    let (messages, has_more) = store.query(request.since, request.limit as usize);
    debug!(
        requester = %request.requester_id,
        returned = messages.len(),
        has_more,
        "answered feed request"
    );
    FeedResponse {
        messages,
        peer_id: identity.id.clone(),
        has_more,
    }
}

// ----------------------------------------------------------------------------
// Requester Side
// ----------------------------------------------------------------------------

/// Pull one page of messages from a peer
///
/// Awaits a single transport round-trip bounded by `timeout`. Failure modes
/// are all scoped to this peer: elapsed timeout, transport failure, or a
/// response that does not decode. None of them may abort a surrounding
/// refresh.
pub async fn pull_from_peer(
    transport: &dyn FeedTransport,
    peer_id: &PeerId,
    request: &FeedRequest,
    timeout: Duration,
) -> Result<Vec<Message>> {
    let payload = request
        .to_bytes()
        .map_err(|e| FeedError::invariant(format!("failed to encode feed request: {e}")))?;

    let raw = match tokio::time::timeout(timeout, transport.request(peer_id, &payload)).await {
        Err(_) => {
            return Err(FeedError::timeout(peer_id.clone(), timeout.as_millis() as u64));
        }
        Ok(Err(transport_err)) => return Err(transport_err.into()),
        Ok(Ok(raw)) => raw,
    };

    let response = FeedResponse::from_bytes(&raw).map_err(|source| {
        FeedError::MalformedResponse {
            peer_id: peer_id.clone(),
            source,
        }
    })?;

    if response.peer_id != *peer_id {
        warn!(
            expected = %peer_id,
            claimed = %response.peer_id,
            "feed response claims a different peer id"
        );
    }

    debug!(peer = %peer_id, count = response.messages.len(), "pull completed");
    Ok(response.messages)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
