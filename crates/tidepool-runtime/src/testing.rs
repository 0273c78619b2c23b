//! In-memory hub transport
//!
//! Connects in-process feed runtimes without any radio stack: a request to a
//! peer is routed straight to that node's responder path. Per-peer behavior
//! switches simulate unreachable and hanging peers, which is how the
//! failure-path tests and the CLI demo exercise the timeout handling.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use tidepool_core::{FeedRequest, FeedTransport, PeerId, TransportError};

use crate::runtime::FeedHandle;

// ----------------------------------------------------------------------------
// Per-Peer Behavior
// ----------------------------------------------------------------------------

/// How the hub treats requests addressed to a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerBehavior {
    /// Route the request to the registered node
    Normal,
    /// Fail immediately as unreachable
    Unreachable,
    /// Never respond, forcing the requester's timeout
    Hang,
}

// ----------------------------------------------------------------------------
// Memory Hub
// ----------------------------------------------------------------------------

#[derive(Default)]
struct HubInner {
    nodes: HashMap<PeerId, FeedHandle>,
    behaviors: HashMap<PeerId, PeerBehavior>,
}

/// Shared routing table for a set of in-process nodes
#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<RwLock<HubInner>>,
}

impl MemoryHub {
    /// Create an empty hub
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport endpoint backed by this hub
    pub fn transport(&self) -> Arc<dyn FeedTransport> {
        Arc::new(HubTransport {
            inner: Arc::clone(&self.inner),
        })
    }

    /// Register a node as reachable under its peer id
    pub async fn register(&self, peer_id: PeerId, handle: FeedHandle) {
        debug!(peer = %peer_id, "node joined hub");
        self.inner.write().await.nodes.insert(peer_id, handle);
    }

    /// Remove a node from the routing table
    pub async fn unregister(&self, peer_id: &PeerId) {
        self.inner.write().await.nodes.remove(peer_id);
    }

    /// Override how requests to a peer behave
    pub async fn set_behavior(&self, peer_id: PeerId, behavior: PeerBehavior) {
        self.inner.write().await.behaviors.insert(peer_id, behavior);
    }
}

// ----------------------------------------------------------------------------
// Hub Transport
// ----------------------------------------------------------------------------

/// Transport endpoint routing requests through the hub
struct HubTransport {
    inner: Arc<RwLock<HubInner>>,
}

#[async_trait]
impl FeedTransport for HubTransport {
    async fn request(
        &self,
        peer_id: &PeerId,
        payload: &[u8],
    ) -> std::result::Result<Vec<u8>, TransportError> {
        let (behavior, target) = {
            let inner = self.inner.read().await;
            (
                inner
                    .behaviors
                    .get(peer_id)
                    .copied()
                    .unwrap_or(PeerBehavior::Normal),
                inner.nodes.get(peer_id).cloned(),
            )
        };

        match behavior {
            PeerBehavior::Hang => std::future::pending().await,
            PeerBehavior::Unreachable => Err(TransportError::Unreachable {
                peer_id: peer_id.clone(),
                reason: "peer marked unreachable".to_string(),
            }),
            PeerBehavior::Normal => {
                let Some(target) = target else {
                    return Err(TransportError::Unreachable {
                        peer_id: peer_id.clone(),
                        reason: "peer not registered with hub".to_string(),
                    });
                };
                let request = FeedRequest::from_bytes(payload).map_err(|e| {
                    TransportError::Unreachable {
                        peer_id: peer_id.clone(),
                        reason: format!("peer rejected request: {e}"),
                    }
                })?;
                let response = target.handle_incoming_request(request).await.map_err(|e| {
                    TransportError::Unreachable {
                        peer_id: peer_id.clone(),
                        reason: format!("peer stopped responding: {e}"),
                    }
                })?;
                response.to_bytes().map_err(|e| TransportError::Unreachable {
                    peer_id: peer_id.clone(),
                    reason: format!("peer response could not be encoded: {e}"),
                })
            }
        }
    }
}
