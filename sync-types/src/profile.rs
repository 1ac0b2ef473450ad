//! Profiles and peers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

use crate::UserId;

/// Presence status of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum UserStatus {
    /// Reachable and active.
    #[default]
    Online,
    /// Reachable but idle.
    Away,
    /// Reachable, do not disturb.
    Busy,
    /// Not reachable.
    Offline,
}

/// Identity of a user, either the local one or mirrored from a peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Primary key.
    pub user_id: UserId,
    /// Unique login-style name.
    pub username: String,
    /// Name shown in the UI.
    pub display_name: String,
    /// Current presence.
    pub status: UserStatus,
    /// Free-form status line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Content hash of the avatar image, if one was set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_hash: Option<String>,
}

impl Profile {
    /// Create an online profile with no status message or avatar.
    pub fn new(
        user_id: impl Into<UserId>,
        username: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            display_name: display_name.into(),
            status: UserStatus::Online,
            status_message: None,
            avatar_hash: None,
        }
    }

    /// Set the presence status.
    pub fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }
}

/// Network location a peer was seen at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkAddress {
    /// Host address.
    pub ip: IpAddr,
    /// Messaging port.
    pub port: u16,
}

impl NetworkAddress {
    /// Create a new address.
    pub fn new(ip: IpAddr, port: u16) -> Self {
        Self { ip, port }
    }

    /// Convert to a socket address.
    pub fn to_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }
}

/// A remote participant observed on the local network.
///
/// Identity is `profile.user_id`; repeated sightings replace the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    /// Mirrored profile of the remote user.
    pub profile: Profile,
    /// Where the peer was last reachable.
    pub address: NetworkAddress,
    /// When the peer was last seen.
    pub last_seen: DateTime<Utc>,
    /// Opaque public key bytes, when the peer announced one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<Vec<u8>>,
}

impl Peer {
    /// Create a peer seen now at the given address.
    pub fn new(profile: Profile, address: NetworkAddress) -> Self {
        Self {
            profile,
            address,
            last_seen: Utc::now(),
            public_key: None,
        }
    }

    /// Identity of this peer.
    pub fn user_id(&self) -> &UserId {
        &self.profile.user_id
    }

    /// Display name, falling back to the username when blank.
    pub fn display_name(&self) -> &str {
        if self.profile.display_name.trim().is_empty() {
            &self.profile.username
        } else {
            &self.profile.display_name
        }
    }
}
