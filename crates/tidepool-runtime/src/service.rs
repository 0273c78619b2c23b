//! Feed service task
//!
//! The single owner of all mutable feed state. Collaborator calls arrive as
//! commands on a bounded channel; refresh pulls run in a spawned task and
//! report back over an internal channel, so every mutation of the store,
//! registry, and aggregator happens inside this task's loop and readers only
//! ever see immutable snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use tidepool_core::{
    protocol, FeedConfig, FeedItem, FeedRequest, FeedResponse, FeedTransport, FeedUpdate, Message,
    MessageKind, MessageStore, Peer, PeerId, PeerIdentity, PeerRegistry, Result,
};

use crate::aggregator::FeedAggregator;

// ----------------------------------------------------------------------------
// Commands
// ----------------------------------------------------------------------------

/// Inbound collaborator calls, one variant per operation
#[derive(Debug)]
pub enum FeedCommand {
    /// Compose and store a local message
    PostMessage {
        content: String,
        kind: MessageKind,
        reply: oneshot::Sender<Result<Message>>,
    },
    /// Start a pull refresh across the current peer set
    Refresh { reply: oneshot::Sender<()> },
    /// Register a peer (idempotent)
    AddPeer {
        peer_id: PeerId,
        nickname: String,
        reply: oneshot::Sender<Vec<Peer>>,
    },
    /// Remove a peer and its cached messages
    RemovePeer {
        peer_id: PeerId,
        reply: oneshot::Sender<()>,
    },
    /// Answer a pull request from a remote peer against the local store
    HandleRequest {
        request: FeedRequest,
        reply: oneshot::Sender<FeedResponse>,
    },
    /// Stop the service loop
    Shutdown,
}

// ----------------------------------------------------------------------------
// Internal Pull Reporting
// ----------------------------------------------------------------------------

/// One peer's pull result, reported back into the owner loop
#[derive(Debug)]
struct PullOutcome {
    refresh_id: u64,
    peer_id: PeerId,
    result: Result<Vec<Message>>,
}

// ----------------------------------------------------------------------------
// Service Statistics
// ----------------------------------------------------------------------------

/// Counters for service activity
#[derive(Debug, Clone, Default)]
pub struct ServiceStats {
    pub commands_processed: u64,
    pub refreshes_started: u64,
    pub refreshes_completed: u64,
    pub pulls_succeeded: u64,
    pub pulls_failed: u64,
}

// ----------------------------------------------------------------------------
// Feed Service
// ----------------------------------------------------------------------------

/// The owner task for store, registry, and aggregator state
pub struct FeedService {
    /// This device's identity
    identity: PeerIdentity,
    /// Runtime configuration
    config: FeedConfig,
    /// Transport to remote peers
    transport: Arc<dyn FeedTransport>,
    /// Locally authored messages
    store: MessageStore,
    /// Known peers
    registry: PeerRegistry,
    /// Remote caches and merge logic
    aggregator: FeedAggregator,
    /// Inbound collaborator commands
    commands: mpsc::Receiver<FeedCommand>,
    /// Pull results from in-flight refreshes
    pull_results: mpsc::Receiver<PullOutcome>,
    /// Cloned into each refresh task
    pull_results_tx: mpsc::Sender<PullOutcome>,
    /// Refresh-progress broadcast
    updates_tx: broadcast::Sender<FeedUpdate>,
    /// Aggregated-feed snapshot publication
    feed_tx: watch::Sender<Arc<[FeedItem]>>,
    /// Peers still outstanding per in-flight refresh
    pending: HashMap<u64, usize>,
    /// Monotonic refresh id
    refresh_counter: u64,
    /// Activity counters
    stats: ServiceStats,
    /// Whether the loop should keep running
    running: bool,
}

impl FeedService {
    /// Create a service over injected state and channel ends
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        identity: PeerIdentity,
        config: FeedConfig,
        transport: Arc<dyn FeedTransport>,
        store: MessageStore,
        registry: PeerRegistry,
        commands: mpsc::Receiver<FeedCommand>,
        updates_tx: broadcast::Sender<FeedUpdate>,
        feed_tx: watch::Sender<Arc<[FeedItem]>>,
    ) -> Self {
        let (pull_results_tx, pull_results) =
            mpsc::channel(config.channels.pull_result_buffer_size);
        let aggregator = FeedAggregator::new(identity.clone());
        Self {
            identity,
            config,
            transport,
            store,
            registry,
            aggregator,
            commands,
            pull_results,
            pull_results_tx,
            updates_tx,
            feed_tx,
            pending: HashMap::new(),
            refresh_counter: 0,
            stats: ServiceStats::default(),
            running: true,
        }
    }

    /// Run the service loop until shutdown or command-channel closure
    pub async fn run(mut self) {
        info!(peer = %self.identity.id, "feed service starting");

        while self.running {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.process_command(command),
                        None => {
                            info!("command channel closed, shutting down");
                            break;
                        }
                    }
                }
                outcome = self.pull_results.recv() => {
                    // The service holds a sender clone, so the channel never
                    // closes from the other side.
                    if let Some(outcome) = outcome {
                        self.process_pull_outcome(outcome);
                    }
                }
            }
        }

        info!(peer = %self.identity.id, "feed service stopped");
    }

    /// Current statistics
    pub fn stats(&self) -> &ServiceStats {
        &self.stats
    }

    // ------------------------------------------------------------------------
    // Command Processing
    // ------------------------------------------------------------------------

    fn process_command(&mut self, command: FeedCommand) {
        self.stats.commands_processed += 1;

        match command {
            FeedCommand::PostMessage {
                content,
                kind,
                reply,
            } => {
                let result = self.post_message(&content, kind);
                let _ = reply.send(result);
            }
            FeedCommand::Refresh { reply } => {
                self.start_refresh();
                let _ = reply.send(());
            }
            FeedCommand::AddPeer {
                peer_id,
                nickname,
                reply,
            } => {
                let peers = self.registry.add(peer_id, nickname);
                self.publish_feed();
                let _ = reply.send(peers);
            }
            FeedCommand::RemovePeer { peer_id, reply } => {
                self.registry.remove(&peer_id);
                self.aggregator.drop_peer(&peer_id);
                self.publish_feed();
                let _ = reply.send(());
            }
            FeedCommand::HandleRequest { request, reply } => {
                let response = protocol::handle_request(&self.store, &self.identity, &request);
                let _ = reply.send(response);
            }
            FeedCommand::Shutdown => {
                self.running = false;
            }
        }
    }

    fn post_message(&mut self, content: &str, kind: MessageKind) -> Result<Message> {
        let message = self.identity.compose(content, kind)?;
        self.store.append(message.clone())?;
        self.aggregator.note_local(&message);
        self.publish_feed();
        debug!(message_id = %message.id, "local message posted");
        Ok(message)
    }

    // ------------------------------------------------------------------------
    // Refresh Orchestration
    // ------------------------------------------------------------------------

    /// Kick off one refresh across the current peer set
    ///
    /// The peer snapshot is taken here, once; peers added or removed while
    /// the refresh is in flight belong to the next refresh. Pulls run with
    /// bounded concurrency and report back through the pull-results channel,
    /// so overlapping refreshes stay independent.
    fn start_refresh(&mut self) {
        self.refresh_counter += 1;
        let refresh_id = self.refresh_counter;
        self.stats.refreshes_started += 1;
        self.send_update(FeedUpdate::RefreshStarted);

        let peers = self.registry.list();
        debug!(refresh_id, peers = peers.len(), "refresh started");
        if peers.is_empty() {
            self.stats.refreshes_completed += 1;
            self.send_update(FeedUpdate::RefreshComplete);
            return;
        }
        self.pending.insert(refresh_id, peers.len());

        let transport = Arc::clone(&self.transport);
        let results = self.pull_results_tx.clone();
        let requester = self.identity.id.clone();
        let timeout = self.config.pull.timeout;
        let page_limit = self.config.pull.page_limit;
        let max_concurrent = self.config.pull.max_concurrent_pulls;

        tokio::spawn(async move {
            stream::iter(peers)
                .for_each_concurrent(max_concurrent, |peer| {
                    let transport = Arc::clone(&transport);
                    let results = results.clone();
                    let request = FeedRequest::with_limit(requester.clone(), None, page_limit);
                    async move {
                        let result = protocol::pull_from_peer(
                            transport.as_ref(),
                            &peer.id,
                            &request,
                            timeout,
                        )
                        .await;
                        // Send failure means the service shut down mid-refresh;
                        // there is nobody left to report to.
                        let _ = results
                            .send(PullOutcome {
                                refresh_id,
                                peer_id: peer.id,
                                result,
                            })
                            .await;
                    }
                })
                .await;
        });
    }

    fn process_pull_outcome(&mut self, outcome: PullOutcome) {
        let PullOutcome {
            refresh_id,
            peer_id,
            result,
        } = outcome;

        match result {
            Ok(messages) => {
                self.stats.pulls_succeeded += 1;
                self.registry.set_online(&peer_id, true);
                let accepted = self.aggregator.ingest(&peer_id, messages);
                self.publish_feed();
                self.send_update(FeedUpdate::PeerUpdated {
                    peer_id,
                    messages: accepted,
                });
            }
            Err(error) => {
                self.stats.pulls_failed += 1;
                warn!(peer = %peer_id, %error, "peer pull failed");
                self.registry.set_online(&peer_id, false);
                self.publish_feed();
                self.send_update(FeedUpdate::PeerError {
                    peer_id,
                    error: error.to_string(),
                });
            }
        }

        if let Some(remaining) = self.pending.get_mut(&refresh_id) {
            *remaining -= 1;
            if *remaining == 0 {
                self.pending.remove(&refresh_id);
                self.stats.refreshes_completed += 1;
                debug!(refresh_id, "refresh complete");
                self.send_update(FeedUpdate::RefreshComplete);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Publication
    // ------------------------------------------------------------------------

    fn publish_feed(&self) {
        let local = self.store.snapshot();
        let peers = self.registry.list();
        let items = self.aggregator.merge(&local, &peers);
        self.feed_tx.send_replace(Arc::from(items));
    }

    fn send_update(&self, update: FeedUpdate) {
        // A send error only means no subscriber is currently listening.
        let _ = self.updates_tx.send(update);
    }
}
