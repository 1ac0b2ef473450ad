//! Chat messages and their delivery status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::{MessageId, SessionId, UserId};

/// Kind of content a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Plain text.
    Text,
    /// Inline image.
    Image,
    /// File announcement.
    File,
    /// Voice clip.
    Audio,
    /// Video clip.
    Video,
    /// Generated by the system, not a user.
    System,
}

/// Delivery status of a message.
///
/// Moves forward only: `Sending → Sent → Delivered → Read`, with `Failed`
/// reachable from `Sending` or `Sent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageStatus {
    /// Submitted locally, not yet accepted by the transport.
    Sending,
    /// Handed to the transport.
    Sent,
    /// Acknowledged by the recipient.
    Delivered,
    /// Read by the recipient.
    Read,
    /// Could not be delivered.
    Failed,
}

impl MessageStatus {
    /// Whether moving from `self` to `next` is a legal forward transition.
    ///
    /// Staying in the same status is not a transition.
    pub fn can_advance_to(self, next: MessageStatus) -> bool {
        use MessageStatus::*;
        match (self, next) {
            (Sending | Sent, Failed) => true,
            (Failed, _) | (_, Failed) => false,
            (from, to) => to.delivery_rank() > from.delivery_rank(),
        }
    }

    fn delivery_rank(self) -> u8 {
        match self {
            MessageStatus::Sending => 0,
            MessageStatus::Sent => 1,
            MessageStatus::Delivered => 2,
            MessageStatus::Read => 3,
            MessageStatus::Failed => u8::MAX,
        }
    }
}

/// A unit of communication between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Identity.
    pub id: MessageId,
    /// Conversation/session grouping key.
    pub session_id: SessionId,
    /// Author.
    pub sender_id: UserId,
    /// Addressee.
    pub recipient_id: UserId,
    /// Kind of content.
    pub message_type: MessageType,
    /// Body (text, or a file name for file messages).
    pub content: String,
    /// Creation time as reported by the sender.
    pub timestamp: DateTime<Utc>,
    /// Delivery status.
    pub status: MessageStatus,
    /// Whether the payload was end-to-end encrypted in transit.
    #[serde(default)]
    pub encrypted: bool,
}

impl Message {
    /// Create a text message in the `Sending` state, timestamped now.
    pub fn new_text(
        session_id: SessionId,
        sender_id: UserId,
        recipient_id: UserId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            sender_id,
            recipient_id,
            message_type: MessageType::Text,
            content: content.into(),
            timestamp: Utc::now(),
            status: MessageStatus::Sending,
            encrypted: false,
        }
    }
}

/// Whether `{sender, recipient} == {local_id, peer_id}`.
///
/// Set equality, not directional: a message from the peer to the local user
/// and one from the local user to the peer both match.
pub fn involves_conversation(message: &Message, local_id: &UserId, peer_id: &UserId) -> bool {
    let (s, r) = (&message.sender_id, &message.recipient_id);
    (s == local_id && r == peer_id) || (s == peer_id && r == local_id)
}

/// Chronological order with ties broken by id, so rendering is
/// deterministic when two messages share a timestamp.
pub fn compare_timestamp(a: &Message, b: &Message) -> Ordering {
    a.timestamp
        .cmp(&b.timestamp)
        .then_with(|| a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use MessageStatus::*;

    fn message(id: &str, from: &str, to: &str, secs: i64) -> Message {
        Message {
            id: MessageId::from(id),
            session_id: SessionId::from("s"),
            sender_id: UserId::from(from),
            recipient_id: UserId::from(to),
            message_type: MessageType::Text,
            content: format!("msg {id}"),
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            status: Sent,
            encrypted: false,
        }
    }

    // ===========================================
    // Status Transition Tests
    // ===========================================

    #[test]
    fn status_advances_forward() {
        assert!(Sending.can_advance_to(Sent));
        assert!(Sending.can_advance_to(Delivered));
        assert!(Sent.can_advance_to(Delivered));
        assert!(Delivered.can_advance_to(Read));
    }

    #[test]
    fn status_never_regresses() {
        assert!(!Delivered.can_advance_to(Sent));
        assert!(!Read.can_advance_to(Delivered));
        assert!(!Sent.can_advance_to(Sending));
    }

    #[test]
    fn same_status_is_not_a_transition() {
        for status in [Sending, Sent, Delivered, Read, Failed] {
            assert!(!status.can_advance_to(status));
        }
    }

    #[test]
    fn failed_only_from_sending_or_sent() {
        assert!(Sending.can_advance_to(Failed));
        assert!(Sent.can_advance_to(Failed));
        assert!(!Delivered.can_advance_to(Failed));
        assert!(!Read.can_advance_to(Failed));
    }

    #[test]
    fn failed_is_final() {
        for next in [Sending, Sent, Delivered, Read] {
            assert!(!Failed.can_advance_to(next));
        }
    }

    // ===========================================
    // Conversation Predicate Tests
    // ===========================================

    #[test]
    fn conversation_matches_both_directions() {
        let u = UserId::from("alice");
        let p = UserId::from("bob");

        assert!(involves_conversation(&message("1", "alice", "bob", 0), &u, &p));
        assert!(involves_conversation(&message("2", "bob", "alice", 0), &u, &p));
    }

    #[test]
    fn conversation_excludes_third_parties() {
        let u = UserId::from("alice");
        let p = UserId::from("bob");

        assert!(!involves_conversation(&message("1", "bob", "carol", 0), &u, &p));
        assert!(!involves_conversation(&message("2", "carol", "alice", 0), &u, &p));
        assert!(!involves_conversation(&message("3", "alice", "alice", 0), &u, &p));
    }

    // ===========================================
    // Ordering Tests
    // ===========================================

    #[test]
    fn compare_orders_by_timestamp_first() {
        let early = message("z", "a", "b", 10);
        let late = message("a", "a", "b", 20);
        assert_eq!(compare_timestamp(&early, &late), Ordering::Less);
    }

    #[test]
    fn compare_breaks_ties_by_id() {
        let first = message("m-1", "a", "b", 10);
        let second = message("m-2", "a", "b", 10);
        assert_eq!(compare_timestamp(&first, &second), Ordering::Less);
        assert_eq!(compare_timestamp(&second, &first), Ordering::Greater);
        assert_eq!(compare_timestamp(&first, &first), Ordering::Equal);
    }

    #[test]
    fn message_decodes_backend_json() {
        let json = r#"{
            "id": "m1",
            "session_id": "s1",
            "sender_id": "bob",
            "recipient_id": "alice",
            "message_type": "Text",
            "content": "hi",
            "timestamp": "2024-05-01T10:00:00Z",
            "status": "Delivered",
            "encrypted": true
        }"#;

        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, MessageId::from("m1"));
        assert_eq!(msg.status, Delivered);
        assert!(msg.encrypted);
    }

    #[test]
    fn new_text_starts_sending() {
        let msg = Message::new_text(SessionId::new(), "a".into(), "b".into(), "hello");
        assert_eq!(msg.status, Sending);
        assert_eq!(msg.message_type, MessageType::Text);
    }
}
