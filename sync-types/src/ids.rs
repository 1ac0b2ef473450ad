//! Identity types for the chat sync layer.
//!
//! The backend hands out identifiers as opaque strings (UUIDs in practice).
//! Each entity gets its own newtype so a `MessageId` can never be passed
//! where a `UserId` is expected.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create a new random identifier (UUID v4).
            pub fn new() -> Self {
                Self(uuid::Uuid::new_v4().to_string())
            }

            /// Borrow the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

string_id!(
    /// Stable identifier of a user (local or remote). Primary key of a profile.
    UserId
);

string_id!(
    /// Identifier of a single message.
    MessageId
);

string_id!(
    /// Identifier of a file transfer.
    TransferId
);

string_id!(
    /// Conversation/session grouping key carried by every message.
    SessionId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_uuid_v4() {
        let id = UserId::new();
        let parsed = uuid::Uuid::parse_str(id.as_str()).unwrap();
        assert_eq!(parsed.get_version_num(), 4);
    }

    #[test]
    fn new_ids_are_unique() {
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn ids_serialize_as_plain_strings() {
        let id = TransferId::from("t-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"t-1\"");

        let back: TransferId = serde_json::from_str("\"t-1\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn ids_order_lexically() {
        assert!(MessageId::from("a") < MessageId::from("b"));
        assert!(MessageId::from("a9") < MessageId::from("b0"));
    }

    #[test]
    fn debug_names_the_kind() {
        assert_eq!(format!("{:?}", UserId::from("bob")), "UserId(bob)");
        assert_eq!(UserId::from("bob").to_string(), "bob");
    }
}
