//! ChatSession - the main interface for the LAN chat sync layer.
//!
//! This module provides [`ChatSession`], the API presentation code uses to
//! bootstrap a session, send messages and files, and read the synchronized
//! model.
//!
//! # Architecture
//!
//! ChatSession drives the pure bootstrap machine (from sync-core) and
//! interprets its actions against the backend gateway and the event bridge.
//!
//! ```text
//! Presentation → ChatSession → Gateway → Backend
//!                    ↓            ↑ push channels
//!               SyncStore ← EventBridge
//! ```
//!
//! # Example
//!
//! ```ignore
//! use lanchat_sync_client::{ChatSession, MockBackend, SessionConfig};
//!
//! let session = ChatSession::new(MockBackend::new(), SessionConfig::default());
//! session.initialize("alice", "Alice A").await?;
//! session.send_message(&bob, "hi").await?;
//! let history = session.read(|s| s.conversation_messages(&bob).len()).await;
//! ```

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::interval;

use lanchat_sync_core::{
    BootstrapAction, BootstrapEvent, BootstrapState, SessionEvent, SnapshotKind, StoreChange,
    SyncStore,
};
use lanchat_sync_types::{Message, Profile, TransferId, UserId};

use crate::bridge::{BridgeError, BridgeStats, EventBridge, Subscription};
use crate::gateway::{Backend, Gateway, GatewayError};
use crate::handle::StoreHandle;

/// Default capacity of the change and session-event broadcast channels.
pub const DEFAULT_UPDATE_CAPACITY: usize = 256;

/// Shortest period accepted by [`ChatSession::spawn_refresh_task`].
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_millis(10);

/// Session errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Gateway error.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Event bridge error.
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// The operation is not valid in the current bootstrap state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

/// Configuration for ChatSession.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// How many changes a slow subscriber may lag before missing some.
    pub update_capacity: usize,
    /// Period of the background snapshot refresh, if any.
    pub refresh_interval: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            update_capacity: DEFAULT_UPDATE_CAPACITY,
            refresh_interval: None,
        }
    }
}

impl SessionConfig {
    /// Create the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the broadcast capacity.
    pub fn with_update_capacity(mut self, capacity: usize) -> Self {
        self.update_capacity = capacity;
        self
    }

    /// Enable periodic snapshot refresh.
    pub fn with_refresh_interval(mut self, period: Duration) -> Self {
        self.refresh_interval = Some(period);
        self
    }
}

type ActionResult = Result<Option<BootstrapEvent>, (BootstrapEvent, SessionError)>;

/// A chat session bound to one backend.
///
/// Owns the store, the event subscription and the bootstrap state.
pub struct ChatSession<B: Backend> {
    config: SessionConfig,
    gateway: Gateway<B>,
    store: StoreHandle,
    bridge: EventBridge,
    subscription: Mutex<Option<Subscription>>,
    state: Mutex<BootstrapState>,
    events: broadcast::Sender<SessionEvent>,
}

impl<B: Backend> ChatSession<B> {
    /// Create a session with its own event bridge.
    pub fn new(backend: B, config: SessionConfig) -> Self {
        Self::with_bridge(Gateway::new(backend), EventBridge::new(), config)
    }

    /// Create a session on an existing gateway and bridge.
    pub fn with_bridge(gateway: Gateway<B>, bridge: EventBridge, config: SessionConfig) -> Self {
        let (events, _) = broadcast::channel(config.update_capacity.max(1));
        Self {
            store: StoreHandle::new(config.update_capacity),
            config,
            gateway,
            bridge,
            subscription: Mutex::new(None),
            state: Mutex::new(BootstrapState::new()),
            events,
        }
    }

    // ===========================================
    // Bootstrap
    // ===========================================

    /// Initialize identity, attach listeners, and pull every snapshot.
    ///
    /// Returns the local profile once the session is ready. On failure the
    /// session stays in a `Failed` state; see [`retry`](Self::retry).
    pub async fn initialize(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<Profile, SessionError> {
        let mut state = self.state.lock().await;
        self.drive(
            &mut state,
            BootstrapEvent::IdentitySubmitted {
                username: username.to_string(),
                display_name: display_name.to_string(),
            },
        )
        .await?;

        self.store
            .read(|s| s.profile().cloned())
            .await
            .ok_or_else(|| SessionError::InvalidState("no profile after bootstrap".into()))
    }

    /// Resume a bootstrap that failed while attaching or syncing.
    pub async fn retry(&self) -> Result<(), SessionError> {
        let mut state = self.state.lock().await;
        self.drive(&mut state, BootstrapEvent::RetryRequested).await
    }

    /// Re-pull every snapshot and merge it. Only valid once ready.
    pub async fn refresh(&self) -> Result<(), SessionError> {
        let state = self.state.lock().await;
        if !state.is_ready() {
            return Err(SessionError::InvalidState(format!(
                "cannot refresh while {:?}",
                *state
            )));
        }
        for kind in SnapshotKind::ALL {
            self.pull(kind).await?;
        }
        Ok(())
    }

    /// Release the event listeners and return to `Uninitialized`.
    ///
    /// The store keeps its contents.
    pub async fn teardown(&self) {
        let mut state = self.state.lock().await;
        // Teardown is accepted in every state and its actions cannot fail.
        let _ = self
            .drive(&mut state, BootstrapEvent::TeardownRequested)
            .await;
    }

    /// Current bootstrap state.
    pub async fn state(&self) -> BootstrapState {
        self.state.lock().await.clone()
    }

    async fn drive(
        &self,
        state: &mut BootstrapState,
        event: BootstrapEvent,
    ) -> Result<(), SessionError> {
        let from = state.clone();
        let (next, actions) = std::mem::take(state).on_event(event.clone());
        *state = next;
        if actions.is_empty() {
            return Err(SessionError::InvalidState(format!(
                "{event:?} not accepted while {from:?}"
            )));
        }

        let mut queue = VecDeque::from(actions);
        let mut first_error = None;
        while let Some(action) = queue.pop_front() {
            let follow_up = match self.execute(action).await {
                Ok(Some(event)) => event,
                Ok(None) => continue,
                Err((event, error)) => {
                    queue.clear();
                    first_error.get_or_insert(error);
                    event
                }
            };
            let (next, more) = std::mem::take(state).on_event(follow_up);
            *state = next;
            queue.extend(more);
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn execute(&self, action: BootstrapAction) -> ActionResult {
        match action {
            BootstrapAction::InitializeIdentity {
                username,
                display_name,
            } => match self.gateway.initialize_identity(&username, &display_name).await {
                Ok(profile) => {
                    let user_id = profile.user_id.clone();
                    self.store.mutate(|s| s.set_profile(profile)).await;
                    Ok(Some(BootstrapEvent::IdentityInitialized { user_id }))
                }
                Err(e) => Err((
                    BootstrapEvent::IdentityFailed {
                        error: e.to_string(),
                    },
                    e.into(),
                )),
            },

            BootstrapAction::AttachListeners => {
                let mut slot = self.subscription.lock().await;
                if slot.is_some() {
                    return Ok(Some(BootstrapEvent::ListenersAttached));
                }
                match self.bridge.attach(&self.gateway, self.store.clone()).await {
                    Ok(subscription) => {
                        *slot = Some(subscription);
                        Ok(Some(BootstrapEvent::ListenersAttached))
                    }
                    Err(e) => Err((
                        BootstrapEvent::AttachFailed {
                            error: e.to_string(),
                        },
                        e.into(),
                    )),
                }
            }

            BootstrapAction::PullSnapshot(kind) => match self.pull(kind).await {
                Ok(()) => Ok(Some(BootstrapEvent::SnapshotMerged(kind))),
                Err(e) => Err((
                    BootstrapEvent::SnapshotFailed {
                        kind,
                        error: e.to_string(),
                    },
                    e.into(),
                )),
            },

            BootstrapAction::DetachListeners => {
                if let Some(subscription) = self.subscription.lock().await.take() {
                    subscription.release();
                }
                Ok(None)
            }

            BootstrapAction::EmitEvent(event) => {
                tracing::info!("Session event: {:?}", event);
                // No receivers is fine.
                let _ = self.events.send(event);
                Ok(None)
            }
        }
    }

    /// Pull one snapshot and merge it. The store is not locked during the
    /// round trip, so events keep flowing.
    async fn pull(&self, kind: SnapshotKind) -> Result<(), GatewayError> {
        let changes = match kind {
            SnapshotKind::Peers => {
                let peers = self.gateway.list_peers().await?;
                self.store.mutate(|s| s.merge_peers(peers)).await
            }
            SnapshotKind::Messages => {
                let messages = self.gateway.list_messages().await?;
                self.store.mutate(|s| s.set_messages(messages)).await
            }
            SnapshotKind::Transfers => {
                let transfers = self.gateway.list_transfers().await?;
                self.store.mutate(|s| s.merge_transfers(transfers)).await
            }
        };
        tracing::debug!("Merged {:?} snapshot ({} changes)", kind, changes.len());
        Ok(())
    }

    // ===========================================
    // Operations
    // ===========================================

    /// Send a text message and append it to the timeline.
    ///
    /// Nothing is appended if the backend rejects the send.
    pub async fn send_message(
        &self,
        recipient_id: &UserId,
        content: &str,
    ) -> Result<Message, SessionError> {
        let message = self.gateway.send_message(recipient_id, content).await?;
        let appended = message.clone();
        self.store.mutate(|s| s.append_message(appended)).await;
        Ok(message)
    }

    /// Offer a file to a peer. Returns the new transfer's id.
    ///
    /// The transfer list is re-read afterwards so the outgoing offer shows up.
    pub async fn send_file(
        &self,
        recipient_id: &UserId,
        path: impl AsRef<Path>,
    ) -> Result<TransferId, SessionError> {
        let transfer_id = self.gateway.send_file(recipient_id, path).await?;
        if let Err(e) = self.pull(SnapshotKind::Transfers).await {
            tracing::warn!("Transfer list refresh after send_file failed: {}", e);
        }
        Ok(transfer_id)
    }

    /// Accept or reject an incoming offer.
    ///
    /// The status change reaches the store through the event bridge.
    pub async fn respond_to_transfer(
        &self,
        transfer_id: &TransferId,
        accept: bool,
    ) -> Result<(), SessionError> {
        self.gateway
            .respond_to_transfer(transfer_id, accept)
            .await?;
        Ok(())
    }

    /// Replace the local profile.
    ///
    /// The store records the profile as the gateway normalized it.
    pub async fn update_profile(&self, profile: Profile) -> Result<(), SessionError> {
        let profile = self.gateway.update_profile(profile).await?;
        self.store.mutate(|s| s.set_profile(profile)).await;
        Ok(())
    }

    /// Select the conversation shown by presentation, or clear it.
    pub async fn set_active_conversation(&self, peer_id: Option<UserId>) -> Option<StoreChange> {
        self.store
            .mutate(|s| s.set_active_conversation(peer_id))
            .await
            .pop()
    }

    // ===========================================
    // Reads
    // ===========================================

    /// Read the store under its lock.
    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SyncStore) -> R,
    {
        self.store.read(f).await
    }

    /// Receive every store change from now on.
    pub fn subscribe_updates(&self) -> broadcast::Receiver<StoreChange> {
        self.store.subscribe()
    }

    /// Receive bootstrap notifications from now on.
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Counts of push events handled by the bridge.
    pub fn bridge_stats(&self) -> BridgeStats {
        self.bridge.stats()
    }

    /// The session's event bridge.
    pub fn bridge(&self) -> &EventBridge {
        &self.bridge
    }

    /// The session's gateway.
    pub fn gateway(&self) -> &Gateway<B> {
        &self.gateway
    }

    /// The configuration the session was built with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

impl<B: Backend + 'static> ChatSession<B> {
    /// Spawn a background task that refreshes every `period`.
    ///
    /// Refreshes are skipped while the session is not ready. Returns a
    /// handle that can be used to abort the task.
    pub fn spawn_refresh_task(session: Arc<Self>, period: Duration) -> JoinHandle<()> {
        let period = period.max(MIN_REFRESH_INTERVAL);
        tokio::spawn(async move {
            tracing::info!("Refresh task started (interval: {:?})", period);

            let mut timer = interval(period);
            // The first tick completes immediately.
            timer.tick().await;

            loop {
                timer.tick().await;

                match session.refresh().await {
                    Ok(()) => tracing::debug!("Refresh: snapshots merged"),
                    Err(SessionError::InvalidState(_)) => {
                        tracing::debug!("Refresh: session not ready, skipped")
                    }
                    Err(e) => tracing::warn!("Refresh error: {}", e),
                }
            }
        })
    }
}
