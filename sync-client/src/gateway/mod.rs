//! Backend gateway for LAN chat.
//!
//! The networking backend (peer discovery, transport, persistence) runs as a
//! separate component and is reached through request/response calls plus
//! named push-event channels. This module abstracts it:
//!
//! - [`Backend`] is the raw capability surface, one method per call
//! - [`Gateway`] wraps a backend with local argument validation and logging
//! - [`MockBackend`] is an in-process fake for tests and the CLI replay
//!
//! # Example
//!
//! ```ignore
//! let gateway = Gateway::new(MockBackend::new());
//! let profile = gateway.initialize_identity("alice", "Alice A").await?;
//! let message = gateway.send_message(&bob, "hi").await?;
//! ```

mod mock;

pub use mock::MockBackend;

use async_trait::async_trait;
use lanchat_sync_types::{
    EventChannel, Message, Peer, Profile, Transfer, TransferId, UserId,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// An argument was rejected before or by the backend.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The recipient is not a known peer.
    #[error("peer not found: {0}")]
    PeerNotFound(UserId),

    /// The referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A local file could not be read.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other backend failure.
    #[error("backend error: {0}")]
    Transport(String),
}

/// Raw payload stream of one push-event channel.
pub type EventStream = mpsc::UnboundedReceiver<serde_json::Value>;

/// Capability surface of the networking backend.
///
/// Implementations perform the actual work (discovery, transport, disk).
/// Calls are independent request/response round trips; none are retried.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create the local identity.
    ///
    /// Backends accept this once per process, before other calls succeed.
    async fn initialize_identity(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<Profile, GatewayError>;

    /// The local profile, if identity has been initialized.
    async fn get_profile(&self) -> Result<Option<Profile>, GatewayError>;

    /// Replace the local profile.
    async fn update_profile(&self, profile: Profile) -> Result<(), GatewayError>;

    /// Snapshot of currently known peers.
    async fn list_peers(&self) -> Result<Vec<Peer>, GatewayError>;

    /// Snapshot of every message the backend holds.
    async fn list_messages(&self) -> Result<Vec<Message>, GatewayError>;

    /// Send a text message to a peer.
    async fn send_message(
        &self,
        recipient_id: &UserId,
        content: &str,
    ) -> Result<Message, GatewayError>;

    /// Offer a local file to a peer.
    async fn send_file(&self, recipient_id: &UserId, path: &Path)
        -> Result<TransferId, GatewayError>;

    /// Accept or reject an incoming offer.
    async fn respond_to_transfer(
        &self,
        transfer_id: &TransferId,
        accept: bool,
    ) -> Result<(), GatewayError>;

    /// Snapshot of every transfer the backend holds.
    async fn list_transfers(&self) -> Result<Vec<Transfer>, GatewayError>;

    /// Subscribe to a push-event channel.
    ///
    /// Each call registers a new listener; payloads are delivered in the
    /// order the backend emits them until the receiver is dropped.
    async fn subscribe(&self, channel: EventChannel) -> Result<EventStream, GatewayError>;
}

/// Typed, stateless front of a [`Backend`].
///
/// Validates arguments locally before the round trip and logs every call.
/// Cloning is cheap and shares the backend.
pub struct Gateway<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> Clone for Gateway<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
        }
    }
}

impl<B: Backend> Gateway<B> {
    /// Wrap a backend.
    pub fn new(backend: B) -> Self {
        Self::from_arc(Arc::new(backend))
    }

    /// Wrap a backend that is already shared.
    pub fn from_arc(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// The wrapped backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Create the local identity. Returns the profile (status Online).
    pub async fn initialize_identity(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<Profile, GatewayError> {
        let username = non_empty(username, "username")?;
        let display_name = non_empty(display_name, "display name")?;
        tracing::debug!("initialize_identity: {}", username);
        logged(
            "initialize_identity",
            self.backend.initialize_identity(username, display_name).await,
        )
    }

    /// The local profile, if any.
    pub async fn get_profile(&self) -> Result<Option<Profile>, GatewayError> {
        tracing::debug!("get_profile");
        logged("get_profile", self.backend.get_profile().await)
    }

    /// Replace the local profile.
    ///
    /// Names are trimmed the same way as in `initialize_identity`. Returns
    /// the profile as forwarded to the backend.
    pub async fn update_profile(&self, mut profile: Profile) -> Result<Profile, GatewayError> {
        profile.username = non_empty(&profile.username, "username")?.to_string();
        profile.display_name = non_empty(&profile.display_name, "display name")?.to_string();
        tracing::debug!("update_profile: {}", profile.user_id);
        logged(
            "update_profile",
            self.backend.update_profile(profile.clone()).await,
        )?;
        Ok(profile)
    }

    /// Snapshot of known peers.
    pub async fn list_peers(&self) -> Result<Vec<Peer>, GatewayError> {
        tracing::debug!("list_peers");
        logged("list_peers", self.backend.list_peers().await)
    }

    /// Snapshot of all messages.
    pub async fn list_messages(&self) -> Result<Vec<Message>, GatewayError> {
        tracing::debug!("list_messages");
        logged("list_messages", self.backend.list_messages().await)
    }

    /// Send a text message. Returns the message as the backend created it.
    pub async fn send_message(
        &self,
        recipient_id: &UserId,
        content: &str,
    ) -> Result<Message, GatewayError> {
        non_empty(content, "message content")?;
        tracing::debug!("send_message: to {} ({} bytes)", recipient_id, content.len());
        logged(
            "send_message",
            self.backend.send_message(recipient_id, content).await,
        )
    }

    /// Offer a file. Returns the id of the new transfer.
    pub async fn send_file(
        &self,
        recipient_id: &UserId,
        path: impl AsRef<Path>,
    ) -> Result<TransferId, GatewayError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(GatewayError::Validation("file path is empty".into()));
        }
        tracing::debug!("send_file: {} to {}", path.display(), recipient_id);
        logged("send_file", self.backend.send_file(recipient_id, path).await)
    }

    /// Accept or reject an incoming offer.
    ///
    /// The resulting status change arrives as a `file-transfer-updated` event.
    pub async fn respond_to_transfer(
        &self,
        transfer_id: &TransferId,
        accept: bool,
    ) -> Result<(), GatewayError> {
        tracing::debug!("respond_to_transfer: {} accept={}", transfer_id, accept);
        logged(
            "respond_to_transfer",
            self.backend.respond_to_transfer(transfer_id, accept).await,
        )
    }

    /// Snapshot of all transfers.
    pub async fn list_transfers(&self) -> Result<Vec<Transfer>, GatewayError> {
        tracing::debug!("list_transfers");
        logged("list_transfers", self.backend.list_transfers().await)
    }

    /// Subscribe to a push-event channel.
    pub async fn subscribe(&self, channel: EventChannel) -> Result<EventStream, GatewayError> {
        tracing::debug!("subscribe: {}", channel);
        logged("subscribe", self.backend.subscribe(channel).await)
    }
}

fn non_empty<'a>(value: &'a str, what: &str) -> Result<&'a str, GatewayError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(GatewayError::Validation(format!("{what} must not be empty")));
    }
    Ok(trimmed)
}

fn logged<T>(call: &str, result: Result<T, GatewayError>) -> Result<T, GatewayError> {
    if let Err(e) = &result {
        tracing::warn!("{} failed: {}", call, e);
    }
    result
}
