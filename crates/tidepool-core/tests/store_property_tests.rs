//! Property-based tests for local store ordering and pagination
//!
//! These tests verify the store's ordering invariant (timestamp descending,
//! insertion order as tiebreak) and the query cursor/limit contract across
//! arbitrary append sequences.

use proptest::prelude::*;
use tidepool_core::{Message, MessageId, MessageKind, MessageStore, PeerId, Timestamp, Ttl};

/// Message with a caller-chosen timestamp; ids encode insertion order
fn message_at(index: usize, millis: i64) -> Message {
    Message {
        id: MessageId::new(format!("m{index}")),
        sender_id: PeerId::new("local"),
        sender_nickname: "local".to_string(),
        content: format!("content {index}"),
        kind: MessageKind::Public,
        timestamp: Timestamp::from_millis(millis),
        ttl: Ttl::DEFAULT,
    }
}

fn insertion_index(message: &Message) -> usize {
    message.id.as_str()[1..].parse().unwrap()
}

/// Generate arbitrary timestamp sequences with plenty of collisions
fn arb_timestamps() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(0i64..50, 0..40)
}

proptest! {
    /// Snapshot is sorted by timestamp descending, later inserts first among
    /// equal timestamps, and has one entry per successful append
    #[test]
    fn snapshot_order_and_length(timestamps in arb_timestamps()) {
        let mut store = MessageStore::new();
        for (index, millis) in timestamps.iter().enumerate() {
            store.append(message_at(index, *millis)).expect("unique ids always append");
        }

        let snapshot = store.snapshot();
        prop_assert_eq!(snapshot.len(), timestamps.len());

        for pair in snapshot.windows(2) {
            prop_assert!(pair[0].timestamp >= pair[1].timestamp);
            if pair[0].timestamp == pair[1].timestamp {
                prop_assert!(insertion_index(&pair[0]) > insertion_index(&pair[1]));
            }
        }
    }

    /// Query never returns a message at or below the cursor, never exceeds
    /// the limit, and reports has_more exactly when the page is full
    #[test]
    fn query_respects_cursor_and_limit(
        timestamps in arb_timestamps(),
        cursor in 0i64..50,
        limit in 1usize..20,
    ) {
        let mut store = MessageStore::new();
        for (index, millis) in timestamps.iter().enumerate() {
            store.append(message_at(index, *millis)).expect("unique ids always append");
        }

        let (page, has_more) = store.query(Some(Timestamp::from_millis(cursor)), limit);

        prop_assert!(page.len() <= limit);
        prop_assert_eq!(has_more, page.len() == limit);
        for message in &page {
            prop_assert!(message.timestamp.as_millis() > cursor);
        }

        // The page is a prefix of the matching suffix of the snapshot.
        let expected: Vec<MessageId> = store
            .snapshot()
            .iter()
            .filter(|m| m.timestamp.as_millis() > cursor)
            .take(limit)
            .map(|m| m.id.clone())
            .collect();
        let got: Vec<MessageId> = page.iter().map(|m| m.id.clone()).collect();
        prop_assert_eq!(got, expected);
    }

    /// An absent cursor matches every message
    #[test]
    fn query_without_cursor_sees_everything(timestamps in arb_timestamps()) {
        let mut store = MessageStore::new();
        for (index, millis) in timestamps.iter().enumerate() {
            store.append(message_at(index, *millis)).expect("unique ids always append");
        }

        let (page, _) = store.query(None, timestamps.len() + 1);
        prop_assert_eq!(page.len(), timestamps.len());
    }
}
