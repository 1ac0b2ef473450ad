//! Error types for decoding backend payloads.

use thiserror::Error;

use crate::EventChannel;

/// A push-event payload that could not be turned into a [`ChatEvent`](crate::ChatEvent).
#[derive(Debug, Error)]
pub enum DecodeError {
    /// The channel name is not one the client understands.
    #[error("unknown event channel: {0}")]
    UnknownChannel(String),

    /// The payload does not match the channel's schema.
    #[error("malformed {channel} payload: {source}")]
    Malformed {
        /// Channel the payload arrived on.
        channel: EventChannel,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DecodeError::UnknownChannel("typing".into());
        assert_eq!(err.to_string(), "unknown event channel: typing");
    }

    #[test]
    fn malformed_names_the_channel() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err = DecodeError::Malformed {
            channel: EventChannel::PeerDiscovered,
            source,
        };
        assert!(err.to_string().starts_with("malformed peer-discovered payload"));
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DecodeError>();
    }
}
