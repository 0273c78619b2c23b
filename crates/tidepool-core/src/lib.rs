//! Tidepool Core Protocol Implementation
//!
//! This crate provides the types, local state, and pull protocol for the
//! Tidepool peer-to-peer feed exchange: devices discovered over a local
//! radio link advertise locally-authored messages, and peers pull updates
//! from each other without a central server. The concrete radio stack is an
//! external collaborator behind the [`transport::FeedTransport`] trait; the
//! runtime crate orchestrates refreshes and aggregation on top of this one.

// ----------------------------------------------------------------------------
// Module Declarations
// ----------------------------------------------------------------------------

pub mod config;
pub mod errors;
pub mod events;
pub mod identity;
pub mod protocol;
pub mod registry;
pub mod store;
pub mod transport;
pub mod types;
pub mod wire;

// ----------------------------------------------------------------------------
// Public API
// ----------------------------------------------------------------------------

pub use config::{ChannelConfig, FeedConfig, PullConfig};
pub use errors::{FeedError, Result, TransportError};
pub use events::FeedUpdate;
pub use registry::PeerRegistry;
pub use store::MessageStore;
pub use transport::{DiscoveryEvent, FeedTransport};
pub use types::{
    FeedItem, Message, MessageId, MessageKind, Peer, PeerId, PeerIdentity, Timestamp, Ttl,
};
pub use wire::{FeedRequest, FeedResponse, DEFAULT_PAGE_LIMIT};
