//! Push events emitted by the backend.
//!
//! The backend delivers each event as a JSON payload on a named channel.
//! [`ChatEvent::decode`] turns a `(channel, payload)` pair into a typed
//! event; anything that does not decode is reported as a [`DecodeError`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{DecodeError, Message, MessageId, MessageStatus, Peer, Transfer};

/// A push-event channel exposed by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventChannel {
    /// A peer was seen on the network.
    PeerDiscovered,
    /// A message arrived.
    MessageReceived,
    /// A peer offered a file.
    TransferRequested,
    /// A transfer changed status or progressed.
    TransferUpdated,
    /// A message was delivered, read, or failed.
    MessageStatusChanged,
}

impl EventChannel {
    /// Every channel, in subscription order.
    pub const ALL: [EventChannel; 5] = [
        EventChannel::PeerDiscovered,
        EventChannel::MessageReceived,
        EventChannel::TransferRequested,
        EventChannel::TransferUpdated,
        EventChannel::MessageStatusChanged,
    ];

    /// Wire name of the channel.
    pub fn name(self) -> &'static str {
        match self {
            EventChannel::PeerDiscovered => "peer-discovered",
            EventChannel::MessageReceived => "message-received",
            EventChannel::TransferRequested => "file-transfer-requested",
            EventChannel::TransferUpdated => "file-transfer-updated",
            EventChannel::MessageStatusChanged => "message-status-changed",
        }
    }
}

impl fmt::Display for EventChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventChannel {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventChannel::ALL
            .into_iter()
            .find(|c| c.name() == s)
            .ok_or_else(|| DecodeError::UnknownChannel(s.to_string()))
    }
}

/// Payload of the `message-status-changed` channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusUpdate {
    /// The message whose status changed.
    pub message_id: MessageId,
    /// The new status.
    pub status: MessageStatus,
}

/// A decoded push event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    /// A peer was seen (first time or again).
    PeerDiscovered(Peer),
    /// A message arrived.
    MessageReceived(Message),
    /// A file was offered.
    TransferRequested(Transfer),
    /// A transfer changed.
    TransferUpdated(Transfer),
    /// A message's delivery status changed.
    MessageStatusChanged(StatusUpdate),
}

impl ChatEvent {
    /// Decode a raw payload received on `channel`.
    pub fn decode(channel: EventChannel, payload: serde_json::Value) -> Result<Self, DecodeError> {
        let malformed = |source| DecodeError::Malformed { channel, source };
        Ok(match channel {
            EventChannel::PeerDiscovered => {
                ChatEvent::PeerDiscovered(serde_json::from_value(payload).map_err(malformed)?)
            }
            EventChannel::MessageReceived => {
                ChatEvent::MessageReceived(serde_json::from_value(payload).map_err(malformed)?)
            }
            EventChannel::TransferRequested => {
                ChatEvent::TransferRequested(serde_json::from_value(payload).map_err(malformed)?)
            }
            EventChannel::TransferUpdated => {
                ChatEvent::TransferUpdated(serde_json::from_value(payload).map_err(malformed)?)
            }
            EventChannel::MessageStatusChanged => ChatEvent::MessageStatusChanged(
                serde_json::from_value(payload).map_err(malformed)?,
            ),
        })
    }

    /// Decode a payload received on a channel given by its wire name.
    pub fn decode_named(channel: &str, payload: serde_json::Value) -> Result<Self, DecodeError> {
        Self::decode(channel.parse()?, payload)
    }

    /// The channel this event travels on.
    pub fn channel(&self) -> EventChannel {
        match self {
            ChatEvent::PeerDiscovered(_) => EventChannel::PeerDiscovered,
            ChatEvent::MessageReceived(_) => EventChannel::MessageReceived,
            ChatEvent::TransferRequested(_) => EventChannel::TransferRequested,
            ChatEvent::TransferUpdated(_) => EventChannel::TransferUpdated,
            ChatEvent::MessageStatusChanged(_) => EventChannel::MessageStatusChanged,
        }
    }

    /// Encode the event's payload as the backend would send it.
    pub fn to_payload(&self) -> serde_json::Value {
        let encoded = match self {
            ChatEvent::PeerDiscovered(peer) => serde_json::to_value(peer),
            ChatEvent::MessageReceived(message) => serde_json::to_value(message),
            ChatEvent::TransferRequested(t) | ChatEvent::TransferUpdated(t) => {
                serde_json::to_value(t)
            }
            ChatEvent::MessageStatusChanged(update) => serde_json::to_value(update),
        };
        // Entity types have no non-string map keys, so serialization cannot fail.
        encoded.unwrap_or(serde_json::Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn peer_payload() -> serde_json::Value {
        json!({
            "profile": {
                "user_id": "bob",
                "username": "bob",
                "display_name": "Bob",
                "status": "Online"
            },
            "address": { "ip": "192.168.1.5", "port": 7000 },
            "last_seen": "2024-05-01T10:00:00Z"
        })
    }

    #[test]
    fn channel_names_roundtrip() {
        for channel in EventChannel::ALL {
            assert_eq!(channel.name().parse::<EventChannel>().unwrap(), channel);
        }
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let err = "typing-indicator".parse::<EventChannel>().unwrap_err();
        assert!(matches!(err, DecodeError::UnknownChannel(name) if name == "typing-indicator"));
    }

    #[test]
    fn decodes_peer_discovered() {
        let event = ChatEvent::decode(EventChannel::PeerDiscovered, peer_payload()).unwrap();
        match event {
            ChatEvent::PeerDiscovered(peer) => assert_eq!(peer.address.port, 7000),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_status_update() {
        let event = ChatEvent::decode_named(
            "message-status-changed",
            json!({ "message_id": "m1", "status": "Read" }),
        )
        .unwrap();
        assert_eq!(
            event,
            ChatEvent::MessageStatusChanged(StatusUpdate {
                message_id: MessageId::from("m1"),
                status: MessageStatus::Read,
            })
        );
    }

    #[test]
    fn payload_on_wrong_channel_is_malformed() {
        let err = ChatEvent::decode(EventChannel::MessageReceived, peer_payload()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Malformed {
                channel: EventChannel::MessageReceived,
                ..
            }
        ));
    }

    #[test]
    fn garbage_payload_is_malformed() {
        assert!(ChatEvent::decode(EventChannel::PeerDiscovered, json!("nope")).is_err());
        assert!(ChatEvent::decode(EventChannel::TransferRequested, json!(null)).is_err());
    }

    #[test]
    fn payload_encoding_decodes_back() {
        let event = ChatEvent::decode(EventChannel::PeerDiscovered, peer_payload()).unwrap();
        let again = ChatEvent::decode(event.channel(), event.to_payload()).unwrap();
        assert_eq!(event, again);
    }
}
