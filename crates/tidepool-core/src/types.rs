//! Core types for the Tidepool feed exchange
//!
//! This module defines the fundamental types used throughout the protocol,
//! using newtype patterns for semantic validation and type safety.

use core::fmt;
use serde::{Deserialize, Serialize};

// ----------------------------------------------------------------------------
// Peer Identifier
// ----------------------------------------------------------------------------

/// Opaque unique identifier for a peer device
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Create a PeerId from an opaque string
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Get the raw string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the identifier is empty (never valid for a real peer)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ----------------------------------------------------------------------------
// Message Identifier
// ----------------------------------------------------------------------------

/// Unique identifier for a message
///
/// Uniqueness is caller-enforced via random generation; colliding ids from
/// different senders are rejected at ingestion, never negotiated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a MessageId from an opaque string
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self(id.into())
    }

    /// Get the raw string form
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if the identifier is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Millisecond timestamp since Unix epoch
///
/// Sender clocks are untrusted: timestamps are a sort key, not a causality
/// guarantee, and are not monotonic per sender.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Timestamp(i64);

impl Timestamp {
    /// Create a timestamp from raw epoch milliseconds
    pub fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Self(duration.as_millis() as i64)
    }

    /// Get the raw milliseconds
    pub fn as_millis(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Hop Budget (TTL)
// ----------------------------------------------------------------------------

/// Hop budget bounding future multi-hop relay of a message
///
/// Single-hop exchange stores it but never decrements it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Ttl(u32);

impl Ttl {
    /// Default hop budget for new messages
    pub const DEFAULT: Self = Self(7);

    /// Create a new hop budget
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get the raw value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Decrement the budget, returning None once exhausted
    pub fn decrement(self) -> Option<Self> {
        self.0.checked_sub(1).map(Self)
    }
}

impl Default for Ttl {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// ----------------------------------------------------------------------------
// Message Kind
// ----------------------------------------------------------------------------

/// Visibility class of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageKind {
    Public,
    Private,
    Behavioral,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::Public => write!(f, "PUBLIC"),
            MessageKind::Private => write!(f, "PRIVATE"),
            MessageKind::Behavioral => write!(f, "BEHAVIORAL"),
        }
    }
}

// ----------------------------------------------------------------------------
// Message
// ----------------------------------------------------------------------------

/// An immutable feed message
///
/// Corrections are new messages; a message is never edited in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message id
    pub id: MessageId,
    /// Id of the authoring peer
    pub sender_id: PeerId,
    /// Nickname of the authoring peer at composition time
    pub sender_nickname: String,
    /// Message body
    pub content: String,
    /// Visibility class
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Wall-clock timestamp at composition (sender's clock, untrusted)
    pub timestamp: Timestamp,
    /// Hop budget for future multi-hop relay
    pub ttl: Ttl,
}

// ----------------------------------------------------------------------------
// Peer Identity
// ----------------------------------------------------------------------------

/// This device's identity, created at process start and immutable afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerIdentity {
    /// Globally unique device id
    pub id: PeerId,
    /// Human-readable display name
    pub nickname: String,
}

// ----------------------------------------------------------------------------
// Peer
// ----------------------------------------------------------------------------

/// A known remote peer as tracked by the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Peer device id
    pub id: PeerId,
    /// Display name advertised by the peer
    pub nickname: String,
    /// Whether the registry currently considers the peer reachable
    pub is_online: bool,
}

impl Peer {
    /// Create a peer record in the online state
    pub fn new(id: PeerId, nickname: impl Into<String>) -> Self {
        Self {
            id,
            nickname: nickname.into(),
            is_online: true,
        }
    }
}

// ----------------------------------------------------------------------------
// Feed Item
// ----------------------------------------------------------------------------

/// A message annotated with provenance for the aggregated feed
///
/// Derived on every aggregation pass, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    /// The underlying message
    pub message: Message,
    /// True if this device authored the message
    pub is_local: bool,
    /// The peer this item was sourced from (self for local messages)
    pub from_peer: Peer,
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
