//! Transport abstraction for the feed exchange
//!
//! The concrete short-range radio stack lives outside this crate; the core
//! only depends on a request/response payload contract and a discovery event
//! stream. Payload contents are the JSON wire types from [`crate::wire`].

use async_trait::async_trait;

use crate::errors::TransportError;
use crate::types::PeerId;

// ----------------------------------------------------------------------------
// Transport Trait
// ----------------------------------------------------------------------------

/// Request/response channel to a single peer
///
/// `request` is the only suspending operation in the core: it awaits one
/// full round-trip and either yields the peer's response payload or fails
/// with a transport error scoped to that peer. Callers bound it with a
/// timeout; implementations need not enforce one themselves.
#[async_trait]
pub trait FeedTransport: Send + Sync {
    /// Send a request payload to a peer and await its response payload
    async fn request(
        &self,
        peer_id: &PeerId,
        payload: &[u8],
    ) -> Result<Vec<u8>, TransportError>;
}

// ----------------------------------------------------------------------------
// Discovery Events
// ----------------------------------------------------------------------------

/// Connectivity changes reported by the transport's discovery scan
///
/// `Lost` must translate into a registry removal; the registry itself never
/// expires peers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A peer became reachable
    Appeared { peer_id: PeerId, nickname: String },
    /// A previously reachable peer disconnected
    Lost { peer_id: PeerId },
}

// ----------------------------------------------------------------------------
// Mock Transport (for testing)
// ----------------------------------------------------------------------------

/// Scripted per-peer behavior for [`MockTransport`]
#[cfg(test)]
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Respond with a fixed payload
    Respond(Vec<u8>),
    /// Fail immediately as unreachable
    Unreachable,
    /// Never respond, forcing the caller's timeout
    Hang,
}

/// Deterministic transport double for unit tests
#[cfg(test)]
pub struct MockTransport {
    behaviors: std::collections::HashMap<PeerId, MockBehavior>,
}

#[cfg(test)]
impl MockTransport {
    pub fn new() -> Self {
        Self {
            behaviors: std::collections::HashMap::new(),
        }
    }

    pub fn script(mut self, peer_id: PeerId, behavior: MockBehavior) -> Self {
        self.behaviors.insert(peer_id, behavior);
        self
    }
}

#[cfg(test)]
#[async_trait]
impl FeedTransport for MockTransport {
    async fn request(
        &self,
        peer_id: &PeerId,
        _payload: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        match self.behaviors.get(peer_id) {
            Some(MockBehavior::Respond(payload)) => Ok(payload.clone()),
            Some(MockBehavior::Unreachable) | None => Err(TransportError::Unreachable {
                peer_id: peer_id.clone(),
                reason: "no route".to_string(),
            }),
            Some(MockBehavior::Hang) => std::future::pending().await,
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_transport_scripts() {
        let transport = MockTransport::new()
            .script(PeerId::new("up"), MockBehavior::Respond(b"pong".to_vec()))
            .script(PeerId::new("down"), MockBehavior::Unreachable);

        let response = transport.request(&PeerId::new("up"), b"ping").await.unwrap();
        assert_eq!(response, b"pong");

        let err = transport
            .request(&PeerId::new("down"), b"ping")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unreachable { .. }));

        // Unknown peers behave like unreachable ones.
        let err = transport
            .request(&PeerId::new("ghost"), b"ping")
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Unreachable { .. }));
    }
}
