//! Feed runtime
//!
//! Wires the channels, spawns the [`FeedService`] owner task, and hands
//! collaborators a [`FeedHandle`]. Every channel is created here and passed
//! in explicitly; there is no process-wide event bus.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tidepool_core::{FeedConfig, MessageKind, PeerIdentity};
//! use tidepool_runtime::{FeedRuntime, testing::MemoryHub};
//!
//! # #[tokio::main]
//! # async fn main() -> tidepool_core::Result<()> {
//! let hub = MemoryHub::new();
//! let identity = PeerIdentity::generate_with_nickname("demo");
//! let mut runtime = FeedRuntime::new(identity, FeedConfig::default(), hub.transport());
//! let handle = runtime.start()?;
//!
//! handle.post_message("hello out there", MessageKind::Public).await?;
//! handle.refresh().await?;
//! runtime.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use tidepool_core::{
    DiscoveryEvent, FeedConfig, FeedError, FeedItem, FeedRequest, FeedResponse, FeedTransport,
    FeedUpdate, Message, MessageKind, MessageStore, Peer, PeerId, PeerIdentity, PeerRegistry,
    Result,
};

use crate::service::{FeedCommand, FeedService};

// ----------------------------------------------------------------------------
// Feed Handle
// ----------------------------------------------------------------------------

/// Collaborator-facing handle to a running feed service
///
/// Cloneable; all clones talk to the same service task.
#[derive(Clone)]
pub struct FeedHandle {
    commands: mpsc::Sender<FeedCommand>,
    updates_tx: broadcast::Sender<FeedUpdate>,
    feed_rx: watch::Receiver<Arc<[FeedItem]>>,
    peers_rx: watch::Receiver<Arc<[Peer]>>,
    local_rx: watch::Receiver<Arc<[Message]>>,
}

impl FeedHandle {
    /// Compose and store a local message
    pub async fn post_message(&self, content: &str, kind: MessageKind) -> Result<Message> {
        let (reply, response) = oneshot::channel();
        self.send(FeedCommand::PostMessage {
            content: content.to_string(),
            kind,
            reply,
        })
        .await?;
        self.recv(response).await?
    }

    /// Start a pull refresh across all currently known peers
    ///
    /// Returns once the refresh is underway; progress arrives on the stream
    /// from [`FeedHandle::subscribe_updates`].
    pub async fn refresh(&self) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(FeedCommand::Refresh { reply }).await?;
        self.recv(response).await
    }

    /// Register a peer; returns the resulting peer set
    pub async fn add_peer(&self, peer_id: PeerId, nickname: &str) -> Result<Vec<Peer>> {
        let (reply, response) = oneshot::channel();
        self.send(FeedCommand::AddPeer {
            peer_id,
            nickname: nickname.to_string(),
            reply,
        })
        .await?;
        self.recv(response).await
    }

    /// Remove a peer and its cached messages
    pub async fn remove_peer(&self, peer_id: PeerId) -> Result<()> {
        let (reply, response) = oneshot::channel();
        self.send(FeedCommand::RemovePeer { peer_id, reply }).await?;
        self.recv(response).await
    }

    /// Answer a pull request from a remote peer
    ///
    /// Called by the transport layer when this device is the responder.
    pub async fn handle_incoming_request(&self, request: FeedRequest) -> Result<FeedResponse> {
        let (reply, response) = oneshot::channel();
        self.send(FeedCommand::HandleRequest { request, reply })
            .await?;
        self.recv(response).await
    }

    /// Ask the service to stop
    pub async fn shutdown(&self) -> Result<()> {
        self.send(FeedCommand::Shutdown).await
    }

    /// Subscribe to refresh-progress events
    pub fn subscribe_updates(&self) -> broadcast::Receiver<FeedUpdate> {
        self.updates_tx.subscribe()
    }

    /// Watch aggregated-feed snapshots
    pub fn watch_feed(&self) -> watch::Receiver<Arc<[FeedItem]>> {
        self.feed_rx.clone()
    }

    /// Watch peer-list snapshots
    pub fn watch_peers(&self) -> watch::Receiver<Arc<[Peer]>> {
        self.peers_rx.clone()
    }

    /// Watch local-store snapshots
    pub fn watch_local(&self) -> watch::Receiver<Arc<[Message]>> {
        self.local_rx.clone()
    }

    async fn send(&self, command: FeedCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| FeedError::channel("feed service is not running"))
    }

    async fn recv<T>(&self, response: oneshot::Receiver<T>) -> Result<T> {
        response
            .await
            .map_err(|_| FeedError::channel("feed service dropped the reply"))
    }
}

// ----------------------------------------------------------------------------
// Feed Runtime
// ----------------------------------------------------------------------------

/// Owns the service task for one device
pub struct FeedRuntime {
    /// This device's identity
    identity: PeerIdentity,
    /// Configuration applied at start
    config: FeedConfig,
    /// Transport to remote peers
    transport: Arc<dyn FeedTransport>,
    /// Handle to the running service
    handle: Option<FeedHandle>,
    /// Service task join handle
    service_handle: Option<JoinHandle<()>>,
    /// Discovery translation task, if attached
    discovery_handle: Option<JoinHandle<()>>,
    /// Running state
    running: bool,
}

impl FeedRuntime {
    /// Create a runtime; nothing is spawned until [`FeedRuntime::start`]
    pub fn new(
        identity: PeerIdentity,
        config: FeedConfig,
        transport: Arc<dyn FeedTransport>,
    ) -> Self {
        Self {
            identity,
            config,
            transport,
            handle: None,
            service_handle: None,
            discovery_handle: None,
            running: false,
        }
    }

    /// Validate configuration, wire channels, and spawn the service task
    pub fn start(&mut self) -> Result<FeedHandle> {
        if self.running {
            return Err(FeedError::configuration("runtime already running"));
        }
        self.config
            .validate()
            .map_err(FeedError::configuration)?;

        let (command_tx, command_rx) = mpsc::channel(self.config.channels.command_buffer_size);
        let (updates_tx, _) = broadcast::channel(self.config.channels.update_buffer_size);
        let (feed_tx, feed_rx) = watch::channel(Arc::from(Vec::<FeedItem>::new()));

        let store = MessageStore::new();
        let registry = PeerRegistry::new();
        let local_rx = store.subscribe();
        let peers_rx = registry.subscribe();

        let service = FeedService::new(
            self.identity.clone(),
            self.config.clone(),
            Arc::clone(&self.transport),
            store,
            registry,
            command_rx,
            updates_tx.clone(),
            feed_tx,
        );
        self.service_handle = Some(tokio::spawn(service.run()));

        let handle = FeedHandle {
            commands: command_tx,
            updates_tx,
            feed_rx,
            peers_rx,
            local_rx,
        };
        self.handle = Some(handle.clone());
        self.running = true;

        info!(peer = %self.identity.id, "feed runtime started");
        Ok(handle)
    }

    /// Translate transport discovery events into peer registration
    ///
    /// `Appeared` registers the peer; `Lost` removes it, which is the only
    /// way a peer ever leaves the registry.
    pub fn attach_discovery(&mut self, mut events: mpsc::Receiver<DiscoveryEvent>) -> Result<()> {
        let handle = self
            .handle
            .clone()
            .ok_or_else(|| FeedError::configuration("runtime not started"))?;

        self.discovery_handle = Some(tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let result = match event {
                    DiscoveryEvent::Appeared { peer_id, nickname } => {
                        handle.add_peer(peer_id, &nickname).await.map(|_| ())
                    }
                    DiscoveryEvent::Lost { peer_id } => handle.remove_peer(peer_id).await,
                };
                if let Err(error) = result {
                    warn!(%error, "stopping discovery translation");
                    break;
                }
            }
        }));
        Ok(())
    }

    /// Stop the service and any attached discovery translation
    pub async fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;

        if let Some(handle) = self.discovery_handle.take() {
            handle.abort();
        }
        if let Some(handle) = &self.handle {
            let _ = handle.shutdown().await;
        }
        if let Some(service) = self.service_handle.take() {
            let _ = service.await;
        }
        self.handle = None;

        info!(peer = %self.identity.id, "feed runtime stopped");
    }

    /// Handle to the running service, if started
    pub fn handle(&self) -> Option<&FeedHandle> {
        self.handle.as_ref()
    }

    /// This device's identity
    pub fn identity(&self) -> &PeerIdentity {
        &self.identity
    }

    /// Whether the service task has been started
    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for FeedRuntime {
    fn drop(&mut self) {
        if self.running {
            if let Some(handle) = &self.service_handle {
                handle.abort();
            }
            if let Some(handle) = &self.discovery_handle {
                handle.abort();
            }
        }
    }
}
