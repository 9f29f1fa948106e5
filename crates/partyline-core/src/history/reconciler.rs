//! Merge, dedup, and ordering of chat history.
//!
//! History reaches the client from several places: the persisted copy, the
//! batch returned by every (re)join, and live chat frames. `MessageReconciler`
//! folds them into one collection that never holds two messages with the same
//! `(timestamp, body)` key and is always sorted ascending by timestamp.

use std::collections::HashSet;

use partyline_types::message::{Message, MessageKey};

/// Stateless history reconciler. All logic lives in associated functions.
pub struct MessageReconciler;

impl MessageReconciler {
    /// Fold the acting user's nickname into a system message body.
    ///
    /// `"joined"` by `Bob` becomes `"Bob joined"`. Applied at most once per
    /// message: the `actor_prefixed` marker makes repeated calls no-ops.
    /// Non-system messages are left untouched.
    pub fn normalize(message: &mut Message) {
        if !message.is_system_message || message.actor_prefixed {
            return;
        }
        if !message.user_nickname.is_empty() {
            message.body = format!("{} {}", message.user_nickname, message.body);
        }
        message.actor_prefixed = true;
    }

    /// Merge `incoming` into `existing` and return the reconciled collection.
    pub fn merge(existing: Vec<Message>, incoming: impl IntoIterator<Item = Message>) -> Vec<Message> {
        let mut merged = existing;
        Self::merge_into(&mut merged, incoming);
        merged
    }

    /// Merge `incoming` into `collection` in place.
    ///
    /// Every message is normalized before its key is computed. Duplicates
    /// already present in `collection` are dropped (first occurrence wins),
    /// incoming messages whose key is already present are skipped, and the
    /// result is stable-sorted by timestamp. Returns the number of incoming
    /// messages that were added.
    pub fn merge_into(collection: &mut Vec<Message>, incoming: impl IntoIterator<Item = Message>) -> usize {
        let mut seen: HashSet<MessageKey> = HashSet::with_capacity(collection.len());
        for message in collection.iter_mut() {
            Self::normalize(message);
        }
        collection.retain(|message| seen.insert(message.key()));

        let mut added = 0;
        for mut message in incoming {
            Self::normalize(&mut message);
            if seen.insert(message.key()) {
                collection.push(message);
                added += 1;
            }
        }

        collection.sort_by_key(|message| message.timestamp);
        added
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(timestamp: i64, body: &str) -> Message {
        Message::chat("p-1", "Alice", body, timestamp)
    }

    fn keys(messages: &[Message]) -> HashSet<MessageKey> {
        messages.iter().map(Message::key).collect()
    }

    fn is_sorted(messages: &[Message]) -> bool {
        messages.windows(2).all(|w| w[0].timestamp <= w[1].timestamp)
    }

    fn samples() -> Vec<Vec<Message>> {
        vec![
            vec![],
            vec![msg(100, "hi")],
            vec![msg(100, "hi"), msg(50, "yo")],
            vec![msg(300, "c"), msg(100, "a"), msg(200, "b")],
            vec![msg(100, "hi"), msg(100, "hi"), msg(100, "other")],
            vec![Message::system("Bob", "joined", 150), msg(150, "hey")],
            vec![Message::system("Bob", "joined", 150), msg(20, "early")],
        ]
    }

    #[test]
    fn test_merge_dedups_and_sorts_scenario() {
        let existing = vec![msg(100, "hi")];
        let incoming = vec![msg(100, "hi"), msg(50, "yo")];

        let merged = MessageReconciler::merge(existing, incoming);
        assert_eq!(merged.len(), 2);
        assert_eq!((merged[0].timestamp, merged[0].body.as_str()), (50, "yo"));
        assert_eq!((merged[1].timestamp, merged[1].body.as_str()), (100, "hi"));
    }

    #[test]
    fn test_merge_is_idempotent() {
        for a in samples() {
            for b in samples() {
                let once = MessageReconciler::merge(a.clone(), b.clone());
                let twice = MessageReconciler::merge(once.clone(), b.clone());
                assert_eq!(once, twice, "merge(merge(A,B),B) != merge(A,B) for A={a:?} B={b:?}");
            }
        }
    }

    #[test]
    fn test_merge_key_set_is_union_in_either_order() {
        for a in samples() {
            for b in samples() {
                let ab = MessageReconciler::merge(a.clone(), b.clone());
                let ba = MessageReconciler::merge(b.clone(), a.clone());

                let mut normalized_a = a.clone();
                let mut normalized_b = b.clone();
                normalized_a.iter_mut().for_each(MessageReconciler::normalize);
                normalized_b.iter_mut().for_each(MessageReconciler::normalize);
                let union: HashSet<_> = keys(&normalized_a).union(&keys(&normalized_b)).cloned().collect();

                assert_eq!(keys(&ab), union);
                assert_eq!(keys(&ba), union);
                assert_eq!(ab.len(), union.len(), "merged collection holds a duplicate key");
            }
        }
    }

    #[test]
    fn test_merge_output_is_sorted() {
        for a in samples() {
            for b in samples() {
                assert!(is_sorted(&MessageReconciler::merge(a.clone(), b.clone())));
            }
        }
    }

    #[test]
    fn test_sort_is_stable_on_timestamp_ties() {
        let merged = MessageReconciler::merge(vec![msg(100, "first")], vec![msg(100, "second"), msg(100, "third")]);
        let bodies: Vec<_> = merged.iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, ["first", "second", "third"]);
    }

    #[test]
    fn test_system_message_prefixed_once_across_merges() {
        let raw = Message::system("Bob", "joined", 10);

        let first = MessageReconciler::merge(Vec::new(), vec![raw.clone()]);
        let second = MessageReconciler::merge(first, vec![raw]);

        assert_eq!(second.len(), 1);
        assert_eq!(second[0].body, "Bob joined");
        assert!(second[0].actor_prefixed);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let mut message = Message::system("Bob", "left", 1);
        MessageReconciler::normalize(&mut message);
        MessageReconciler::normalize(&mut message);
        assert_eq!(message.body, "Bob left");

        let mut chat = msg(1, "Bob left");
        MessageReconciler::normalize(&mut chat);
        assert_eq!(chat.body, "Bob left");
        assert!(!chat.actor_prefixed);
    }

    #[test]
    fn test_system_message_without_nickname_keeps_body() {
        let mut message = Message::system("", "joined", 1);
        MessageReconciler::normalize(&mut message);
        assert_eq!(message.body, "joined");
        assert!(message.actor_prefixed);
    }

    #[test]
    fn test_merge_into_reports_added_count() {
        let mut collection = vec![msg(1, "a")];
        let added = MessageReconciler::merge_into(&mut collection, vec![msg(1, "a"), msg(2, "b"), msg(2, "b")]);
        assert_eq!(added, 1);
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_same_millisecond_same_text_collapses() {
        // Distinct senders, same millisecond, same text: treated as one message.
        let alice = Message::chat("p-1", "Alice", "lol", 500);
        let bob = Message::chat("p-2", "Bob", "lol", 500);
        let merged = MessageReconciler::merge(vec![alice], vec![bob]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].user_nickname, "Alice");
    }
}
