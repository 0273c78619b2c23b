//! Tidepool Runtime Engine
//!
//! This crate contains the engine for the Tidepool feed exchange:
//! - [`FeedRuntime`]: wires channels and spawns the owner task
//! - [`service::FeedService`]: the single task owning all mutable feed state
//! - [`FeedAggregator`]: per-peer caches and the merged, time-ordered feed
//! - [`testing::MemoryHub`]: an in-memory transport for tests and demos
//!
//! `tidepool-core` defines the stable protocol surface; this crate
//! orchestrates refreshes and aggregation on top of it.

pub mod aggregator;
pub mod runtime;
pub mod service;
pub mod testing;

pub use aggregator::{AggregatorStats, FeedAggregator};
pub use runtime::{FeedHandle, FeedRuntime};
pub use service::{FeedCommand, FeedService, ServiceStats};

// Re-export core types for convenience
pub use tidepool_core::{
    DiscoveryEvent, FeedConfig, FeedError, FeedItem, FeedRequest, FeedResponse, FeedTransport,
    FeedUpdate, Message, MessageId, MessageKind, Peer, PeerId, PeerIdentity, Result, Timestamp,
    Ttl,
};
