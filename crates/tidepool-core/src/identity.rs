//! Device identity: id generation and message composition.

use uuid::Uuid;

use crate::errors::{FeedError, Result};
use crate::types::{Message, MessageId, MessageKind, PeerId, PeerIdentity, Timestamp, Ttl};

impl PeerIdentity {
    /// Generate a fresh process identity with a random unique id and a
    /// default nickname derived from it. Generation cannot fail.
    pub fn generate() -> Self {
        let id = Uuid::new_v4().to_string();
        let nickname = format!("peer-{}", &id[..8]);
        Self {
            id: PeerId::new(id),
            nickname,
        }
    }

    /// Generate an identity with an explicit nickname
    pub fn generate_with_nickname(nickname: impl Into<String>) -> Self {
        Self {
            nickname: nickname.into(),
            ..Self::generate()
        }
    }

    /// Compose a message with the default hop budget
    pub fn compose(&self, content: &str, kind: MessageKind) -> Result<Message> {
        self.compose_with_ttl(content, kind, Ttl::DEFAULT)
    }

    /// Compose a message authored by this identity
    ///
    /// Stamps a fresh unique id and the current wall-clock timestamp.
    /// Content must be non-empty after trimming; whitespace-only content is
    /// rejected before anything is stored.
    pub fn compose_with_ttl(&self, content: &str, kind: MessageKind, ttl: Ttl) -> Result<Message> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err(FeedError::invalid_content(
                "message content is empty after trimming",
            ));
        }

        Ok(Message {
            id: MessageId::new(Uuid::new_v4().to_string()),
            sender_id: self.id.clone(),
            sender_nickname: self.nickname.clone(),
            content: trimmed.to_string(),
            kind,
            timestamp: Timestamp::now(),
            ttl,
        })
    }
}
