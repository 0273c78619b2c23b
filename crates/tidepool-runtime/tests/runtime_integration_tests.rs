//! Integration tests for runtime wiring and the collaborator surface
//!
//! Covers the handle's inbound calls, the responder path, duplicate-id
//! ingestion defense, discovery translation, and runtime lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;

use tidepool_core::{
    DiscoveryEvent, FeedConfig, FeedError, FeedRequest, FeedResponse, FeedTransport, FeedUpdate,
    Message, MessageId, MessageKind, PeerId, PeerIdentity, Timestamp, TransportError, Ttl,
};
use tidepool_runtime::testing::MemoryHub;
use tidepool_runtime::FeedRuntime;

// ----------------------------------------------------------------------------
// Test Utilities
// ----------------------------------------------------------------------------

/// Transport answering every pull with a canned response per peer
struct ScriptedTransport {
    responses: HashMap<PeerId, Vec<u8>>,
}

#[async_trait]
impl FeedTransport for ScriptedTransport {
    async fn request(
        &self,
        peer_id: &PeerId,
        _payload: &[u8],
    ) -> Result<Vec<u8>, TransportError> {
        self.responses
            .get(peer_id)
            .cloned()
            .ok_or_else(|| TransportError::Unreachable {
                peer_id: peer_id.clone(),
                reason: "not scripted".to_string(),
            })
    }
}

fn remote_message(sender: &str, id: &str, millis: i64) -> Message {
    Message {
        id: MessageId::new(id),
        sender_id: PeerId::new(sender),
        sender_nickname: sender.to_string(),
        content: format!("content from {sender}"),
        kind: MessageKind::Public,
        timestamp: Timestamp::from_millis(millis),
        ttl: Ttl::DEFAULT,
    }
}

fn canned_response(peer: &str, messages: Vec<Message>) -> Vec<u8> {
    FeedResponse {
        messages,
        peer_id: PeerId::new(peer),
        has_more: false,
    }
    .to_bytes()
    .unwrap()
}

/// Wait until a watch value satisfies the predicate
async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, predicate: F)
where
    F: Fn(&T) -> bool,
{
    timeout(Duration::from_secs(5), async {
        loop {
            {
                let value = rx.borrow_and_update();
                if predicate(&value) {
                    return;
                }
            }
            rx.changed().await.expect("watch channel should stay open");
        }
    })
    .await
    .expect("condition should hold within the timeout");
}

// ----------------------------------------------------------------------------
// Collaborator Surface
// ----------------------------------------------------------------------------

#[tokio::test]
async fn post_message_rejects_blank_content() {
    let hub = MemoryHub::new();
    let mut runtime = FeedRuntime::new(
        PeerIdentity::generate_with_nickname("self"),
        FeedConfig::testing(),
        hub.transport(),
    );
    let handle = runtime.start().unwrap();

    let err = handle
        .post_message("   \n ", MessageKind::Public)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::InvalidContent { .. }));

    // Nothing was stored.
    let local = handle.watch_local();
    assert!(local.borrow().is_empty());
}

#[tokio::test]
async fn local_watch_sees_posts_newest_first() {
    let hub = MemoryHub::new();
    let mut runtime = FeedRuntime::new(
        PeerIdentity::generate_with_nickname("self"),
        FeedConfig::testing(),
        hub.transport(),
    );
    let handle = runtime.start().unwrap();

    handle.post_message("first", MessageKind::Public).await.unwrap();
    handle.post_message("second", MessageKind::Private).await.unwrap();

    let mut local = handle.watch_local();
    wait_for(&mut local, |snapshot| snapshot.len() == 2).await;

    let snapshot = local.borrow();
    // Same-millisecond posts fall back to insertion order, newest first.
    assert_eq!(snapshot[0].content, "second");
    assert_eq!(snapshot[1].content, "first");
}

#[tokio::test]
async fn incoming_requests_are_answered_from_the_local_store() {
    let hub = MemoryHub::new();
    let identity = PeerIdentity::generate_with_nickname("responder");
    let own_id = identity.id.clone();
    let mut runtime = FeedRuntime::new(identity, FeedConfig::testing(), hub.transport());
    let handle = runtime.start().unwrap();

    handle.post_message("older", MessageKind::Public).await.unwrap();
    handle.post_message("newer", MessageKind::Public).await.unwrap();

    let request = FeedRequest::with_limit(PeerId::new("remote"), None, 1);
    let response = handle.handle_incoming_request(request).await.unwrap();

    assert_eq!(response.peer_id, own_id);
    assert_eq!(response.messages.len(), 1);
    assert_eq!(response.messages[0].content, "newer");
    assert!(response.has_more);
}

// ----------------------------------------------------------------------------
// Duplicate Defense
// ----------------------------------------------------------------------------

#[tokio::test]
async fn colliding_message_ids_are_ingested_only_once() {
    let mut responses = HashMap::new();
    responses.insert(
        PeerId::new("a"),
        canned_response("a", vec![remote_message("a", "shared-id", 100)]),
    );
    responses.insert(
        PeerId::new("b"),
        canned_response("b", vec![remote_message("b", "shared-id", 150)]),
    );
    let transport = Arc::new(ScriptedTransport { responses });

    let mut runtime = FeedRuntime::new(
        PeerIdentity::generate_with_nickname("self"),
        FeedConfig::testing(),
        transport,
    );
    let handle = runtime.start().unwrap();
    handle.add_peer(PeerId::new("a"), "a").await.unwrap();
    handle.add_peer(PeerId::new("b"), "b").await.unwrap();

    let mut updates = handle.subscribe_updates();
    handle.refresh().await.unwrap();

    let mut accepted_total = 0;
    loop {
        let update = timeout(Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap();
        match update {
            FeedUpdate::PeerUpdated { messages, .. } => accepted_total += messages.len(),
            FeedUpdate::RefreshComplete => break,
            _ => {}
        }
    }

    // Whichever pull lands first keeps the id; the collision is discarded.
    assert_eq!(accepted_total, 1);

    let feed = handle.watch_feed();
    let items = feed.borrow();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].message.id, MessageId::new("shared-id"));
}

// ----------------------------------------------------------------------------
// Discovery Translation
// ----------------------------------------------------------------------------

#[tokio::test]
async fn discovery_events_drive_the_registry() {
    let hub = MemoryHub::new();
    let mut runtime = FeedRuntime::new(
        PeerIdentity::generate_with_nickname("self"),
        FeedConfig::testing(),
        hub.transport(),
    );
    let handle = runtime.start().unwrap();

    let (discovery_tx, discovery_rx) = mpsc::channel(8);
    runtime.attach_discovery(discovery_rx).unwrap();

    discovery_tx
        .send(DiscoveryEvent::Appeared {
            peer_id: PeerId::new("walker"),
            nickname: "walker".to_string(),
        })
        .await
        .unwrap();

    let mut peers = handle.watch_peers();
    wait_for(&mut peers, |snapshot| {
        snapshot.iter().any(|p| p.id == PeerId::new("walker") && p.is_online)
    })
    .await;

    discovery_tx
        .send(DiscoveryEvent::Lost {
            peer_id: PeerId::new("walker"),
        })
        .await
        .unwrap();

    wait_for(&mut peers, |snapshot| snapshot.is_empty()).await;
}

// ----------------------------------------------------------------------------
// Lifecycle
// ----------------------------------------------------------------------------

#[tokio::test]
async fn runtime_rejects_double_start_and_stops_cleanly() {
    let hub = MemoryHub::new();
    let mut runtime = FeedRuntime::new(
        PeerIdentity::generate_with_nickname("self"),
        FeedConfig::testing(),
        hub.transport(),
    );

    assert!(!runtime.is_running());
    let handle = runtime.start().unwrap();
    assert!(runtime.is_running());
    assert!(matches!(
        runtime.start(),
        Err(FeedError::Configuration { .. })
    ));

    runtime.stop().await;
    assert!(!runtime.is_running());

    // The service is gone; handle calls fail instead of hanging.
    let err = handle
        .post_message("too late", MessageKind::Public)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedError::Channel { .. }));
}

#[tokio::test]
async fn overlapping_refreshes_emit_independent_brackets() {
    let hub = MemoryHub::new();
    let mut runtime = FeedRuntime::new(
        PeerIdentity::generate_with_nickname("self"),
        FeedConfig::testing(),
        hub.transport(),
    );
    let handle = runtime.start().unwrap();
    handle.add_peer(PeerId::new("ghost"), "ghost").await.unwrap();

    let mut updates = handle.subscribe_updates();
    handle.refresh().await.unwrap();
    handle.refresh().await.unwrap();

    let mut started = 0;
    let mut completed = 0;
    let mut per_peer = 0;
    while completed < 2 {
        let update = timeout(Duration::from_secs(5), updates.recv())
            .await
            .unwrap()
            .unwrap();
        match update {
            FeedUpdate::RefreshStarted => started += 1,
            FeedUpdate::RefreshComplete => completed += 1,
            FeedUpdate::PeerUpdated { .. } | FeedUpdate::PeerError { .. } => per_peer += 1,
        }
    }

    assert_eq!(started, 2);
    assert_eq!(completed, 2);
    assert_eq!(per_peer, 2);
}
