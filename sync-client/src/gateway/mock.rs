//! Mock backend for testing.
//!
//! Holds seedable snapshots, records every call, and lets tests push events
//! to subscribers at any point (including while a snapshot pull is in
//! flight).

use super::{Backend, EventStream, GatewayError};
use async_trait::async_trait;
use lanchat_sync_types::{
    ChatEvent, EventChannel, Message, MessageStatus, Peer, Profile, SessionId, Transfer,
    TransferId, TransferStatus, UserId,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;

/// Mock backend for testing.
///
/// Clones share state, so a test can keep one handle while the session owns
/// another. Emitted events only reach subscribers; they do not change the
/// mock's own snapshots.
#[derive(Debug, Default, Clone)]
pub struct MockBackend {
    inner: Arc<Mutex<MockBackendInner>>,
}

#[derive(Debug, Default)]
struct MockBackendInner {
    local_user_id: UserId,
    session_id: SessionId,
    profile: Option<Profile>,
    peers: Vec<Peer>,
    messages: Vec<Message>,
    transfers: Vec<Transfer>,
    subscribers: HashMap<EventChannel, Vec<mpsc::UnboundedSender<serde_json::Value>>>,
    failures: HashMap<String, GatewayError>,
    during_call: HashMap<String, Vec<(EventChannel, serde_json::Value)>>,
    calls: Vec<String>,
}

impl MockBackendInner {
    /// Log the call, fire anything queued for it, and return a forced failure.
    fn enter(&mut self, call: &str) -> Result<(), GatewayError> {
        self.calls.push(call.to_string());
        if let Some(events) = self.during_call.remove(call) {
            for (channel, payload) in events {
                self.publish(channel, payload);
            }
        }
        match self.failures.remove(call) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn publish(&mut self, channel: EventChannel, payload: serde_json::Value) -> usize {
        let Some(senders) = self.subscribers.get_mut(&channel) else {
            return 0;
        };
        senders.retain(|tx| tx.send(payload.clone()).is_ok());
        senders.len()
    }

    fn require_identity(&self) -> Result<(), GatewayError> {
        if self.profile.is_none() {
            return Err(GatewayError::Transport("identity not initialized".into()));
        }
        Ok(())
    }

    fn require_peer(&self, recipient_id: &UserId) -> Result<(), GatewayError> {
        if !self.peers.iter().any(|p| p.user_id() == recipient_id) {
            return Err(GatewayError::PeerNotFound(recipient_id.clone()));
        }
        Ok(())
    }
}

impl MockBackend {
    /// Create an empty mock backend with a random local user id.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockBackendInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Use a fixed id for the identity created by `initialize_identity`.
    pub fn with_local_user_id(self, user_id: impl Into<UserId>) -> Self {
        self.lock().local_user_id = user_id.into();
        self
    }

    /// Seed the peer snapshot.
    pub fn with_peers(self, peers: Vec<Peer>) -> Self {
        self.lock().peers = peers;
        self
    }

    /// Seed the message snapshot.
    pub fn with_messages(self, messages: Vec<Message>) -> Self {
        self.lock().messages = messages;
        self
    }

    /// Seed the transfer snapshot.
    pub fn with_transfers(self, transfers: Vec<Transfer>) -> Self {
        self.lock().transfers = transfers;
        self
    }

    /// Add a peer to the snapshot.
    pub fn add_peer(&self, peer: Peer) {
        self.lock().peers.push(peer);
    }

    /// Cause the next call named `call` to fail with `error`.
    ///
    /// Names are the entries of [`calls`](Self::calls), e.g. `"list_peers"`
    /// or `"subscribe:message-received"`.
    pub fn fail_next(&self, call: &str, error: GatewayError) {
        self.lock().failures.insert(call.to_string(), error);
    }

    /// Emit `event` to subscribers while the next `call` is in flight.
    pub fn emit_during(&self, call: &str, event: ChatEvent) {
        self.emit_raw_during(call, event.channel(), event.to_payload());
    }

    /// Emit a raw payload to subscribers while the next `call` is in flight.
    pub fn emit_raw_during(&self, call: &str, channel: EventChannel, payload: serde_json::Value) {
        self.lock()
            .during_call
            .entry(call.to_string())
            .or_default()
            .push((channel, payload));
    }

    /// Emit an event to every live subscriber of its channel.
    ///
    /// Returns the number of subscribers reached.
    pub fn emit(&self, event: ChatEvent) -> usize {
        self.emit_raw(event.channel(), event.to_payload())
    }

    /// Emit an arbitrary payload, valid or not, on `channel`.
    pub fn emit_raw(&self, channel: EventChannel, payload: serde_json::Value) -> usize {
        self.lock().publish(channel, payload)
    }

    /// Number of live subscribers on `channel`.
    pub fn subscriber_count(&self, channel: EventChannel) -> usize {
        let mut inner = self.lock();
        match inner.subscribers.get_mut(&channel) {
            Some(senders) => {
                senders.retain(|tx| !tx.is_closed());
                senders.len()
            }
            None => 0,
        }
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// The local user id the mock assigns.
    pub fn local_user_id(&self) -> UserId {
        self.lock().local_user_id.clone()
    }

    /// Messages the backend holds, including ones sent through it.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    /// Transfers the backend holds, including ones offered through it.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.lock().transfers.clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn initialize_identity(
        &self,
        username: &str,
        display_name: &str,
    ) -> Result<Profile, GatewayError> {
        let mut inner = self.lock();
        inner.enter("initialize_identity")?;

        if inner.profile.is_some() {
            return Err(GatewayError::Transport(
                "identity already initialized".into(),
            ));
        }

        let profile = Profile::new(inner.local_user_id.clone(), username, display_name);
        inner.profile = Some(profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self) -> Result<Option<Profile>, GatewayError> {
        let mut inner = self.lock();
        inner.enter("get_profile")?;
        Ok(inner.profile.clone())
    }

    async fn update_profile(&self, profile: Profile) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        inner.enter("update_profile")?;
        inner.require_identity()?;
        inner.profile = Some(profile);
        Ok(())
    }

    async fn list_peers(&self) -> Result<Vec<Peer>, GatewayError> {
        let mut inner = self.lock();
        inner.enter("list_peers")?;
        Ok(inner.peers.clone())
    }

    async fn list_messages(&self) -> Result<Vec<Message>, GatewayError> {
        let mut inner = self.lock();
        inner.enter("list_messages")?;
        Ok(inner.messages.clone())
    }

    async fn send_message(
        &self,
        recipient_id: &UserId,
        content: &str,
    ) -> Result<Message, GatewayError> {
        let mut inner = self.lock();
        inner.enter("send_message")?;
        inner.require_identity()?;

        if content.trim().is_empty() {
            return Err(GatewayError::Validation("message content is empty".into()));
        }
        inner.require_peer(recipient_id)?;

        let mut message = Message::new_text(
            inner.session_id.clone(),
            inner.local_user_id.clone(),
            recipient_id.clone(),
            content,
        );
        message.status = MessageStatus::Sent;
        inner.messages.push(message.clone());
        Ok(message)
    }

    async fn send_file(
        &self,
        recipient_id: &UserId,
        path: &Path,
    ) -> Result<TransferId, GatewayError> {
        {
            let mut inner = self.lock();
            inner.enter("send_file")?;
            inner.require_identity()?;
            inner.require_peer(recipient_id)?;
        }

        let contents = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| GatewayError::Validation(format!("not a file: {}", path.display())))?;

        let mut inner = self.lock();
        let transfer = Transfer::pending(
            TransferId::new(),
            inner.local_user_id.clone(),
            recipient_id.clone(),
            file_name,
            contents.len() as u64,
            blake3::hash(&contents).to_hex().to_string(),
        );
        let transfer_id = transfer.transfer_id.clone();
        inner.transfers.push(transfer);
        Ok(transfer_id)
    }

    async fn respond_to_transfer(
        &self,
        transfer_id: &TransferId,
        accept: bool,
    ) -> Result<(), GatewayError> {
        let mut inner = self.lock();
        inner.enter("respond_to_transfer")?;

        let transfer = inner
            .transfers
            .iter_mut()
            .find(|t| &t.transfer_id == transfer_id)
            .ok_or_else(|| GatewayError::NotFound(format!("transfer {transfer_id}")))?;
        transfer.status = if accept {
            TransferStatus::Accepted
        } else {
            TransferStatus::Cancelled
        };
        let update = ChatEvent::TransferUpdated(transfer.clone());

        inner.publish(update.channel(), update.to_payload());
        Ok(())
    }

    async fn list_transfers(&self) -> Result<Vec<Transfer>, GatewayError> {
        let mut inner = self.lock();
        inner.enter("list_transfers")?;
        Ok(inner.transfers.clone())
    }

    async fn subscribe(&self, channel: EventChannel) -> Result<EventStream, GatewayError> {
        let mut inner = self.lock();
        inner.enter(&format!("subscribe:{channel}"))?;

        let (tx, rx) = mpsc::unbounded_channel();
        inner.subscribers.entry(channel).or_default().push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lanchat_sync_types::NetworkAddress;
    use std::net::{IpAddr, Ipv4Addr};

    fn bob() -> Peer {
        Peer::new(
            Profile::new("bob", "bob", "Bob"),
            NetworkAddress::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)), 7000),
        )
    }

    async fn initialized() -> MockBackend {
        let backend = MockBackend::new()
            .with_local_user_id("alice")
            .with_peers(vec![bob()]);
        backend.initialize_identity("alice", "Alice").await.unwrap();
        backend
    }

    // ===========================================
    // Identity Tests
    // ===========================================

    #[tokio::test]
    async fn identity_uses_configured_user_id() {
        let backend = MockBackend::new().with_local_user_id("alice");
        let profile = backend.initialize_identity("alice", "Alice A").await.unwrap();

        assert_eq!(profile.user_id, UserId::from("alice"));
        assert_eq!(backend.get_profile().await.unwrap(), Some(profile));
    }

    #[tokio::test]
    async fn identity_initializes_once() {
        let backend = initialized().await;
        let result = backend.initialize_identity("alice", "Alice").await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    #[tokio::test]
    async fn send_requires_identity() {
        let backend = MockBackend::new().with_peers(vec![bob()]);
        let result = backend.send_message(&UserId::from("bob"), "hi").await;
        assert!(matches!(result, Err(GatewayError::Transport(_))));
    }

    // ===========================================
    // Messaging Tests
    // ===========================================

    #[tokio::test]
    async fn send_message_to_known_peer() {
        let backend = initialized().await;

        let message = backend
            .send_message(&UserId::from("bob"), "hi")
            .await
            .unwrap();

        assert_eq!(message.sender_id, UserId::from("alice"));
        assert_eq!(message.status, MessageStatus::Sent);
        assert_eq!(backend.messages(), vec![message]);
    }

    #[tokio::test]
    async fn send_message_to_unknown_peer_fails() {
        let backend = initialized().await;

        let result = backend.send_message(&UserId::from("mallory"), "hi").await;

        assert!(matches!(result, Err(GatewayError::PeerNotFound(id)) if id.as_str() == "mallory"));
        assert!(backend.messages().is_empty());
    }

    // ===========================================
    // File Transfer Tests
    // ===========================================

    #[tokio::test]
    async fn send_file_hashes_contents() {
        let backend = initialized().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, b"hello").unwrap();

        let id = backend
            .send_file(&UserId::from("bob"), &path)
            .await
            .unwrap();

        let transfers = backend.transfers();
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].transfer_id, id);
        assert_eq!(transfers[0].file_name, "notes.txt");
        assert_eq!(transfers[0].file_size, 5);
        assert_eq!(transfers[0].file_hash, blake3::hash(b"hello").to_hex().to_string());
        assert_eq!(transfers[0].status, TransferStatus::Pending);
    }

    #[tokio::test]
    async fn send_missing_file_is_io_error() {
        let backend = initialized().await;
        let dir = tempfile::tempdir().unwrap();

        let result = backend
            .send_file(&UserId::from("bob"), &dir.path().join("missing.bin"))
            .await;

        assert!(matches!(result, Err(GatewayError::Io(_))));
        assert!(backend.transfers().is_empty());
    }

    #[tokio::test]
    async fn respond_to_unknown_transfer_fails() {
        let backend = initialized().await;
        let result = backend
            .respond_to_transfer(&TransferId::from("nope"), true)
            .await;
        assert!(matches!(result, Err(GatewayError::NotFound(_))));
    }

    #[tokio::test]
    async fn rejecting_emits_cancelled_update() {
        let offer = Transfer::pending(
            TransferId::from("t1"),
            UserId::from("bob"),
            UserId::from("alice"),
            "a.bin",
            10,
            "h",
        );
        let backend = initialized().await.with_transfers(vec![offer]);
        let mut updates = backend
            .subscribe(EventChannel::TransferUpdated)
            .await
            .unwrap();

        backend
            .respond_to_transfer(&TransferId::from("t1"), false)
            .await
            .unwrap();

        let payload = updates.recv().await.unwrap();
        match ChatEvent::decode(EventChannel::TransferUpdated, payload).unwrap() {
            ChatEvent::TransferUpdated(t) => assert_eq!(t.status, TransferStatus::Cancelled),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    // ===========================================
    // Subscription Tests
    // ===========================================

    #[tokio::test]
    async fn emit_reaches_each_subscriber() {
        let backend = MockBackend::new();
        let mut first = backend.subscribe(EventChannel::PeerDiscovered).await.unwrap();
        let mut second = backend.subscribe(EventChannel::PeerDiscovered).await.unwrap();

        assert_eq!(backend.emit(ChatEvent::PeerDiscovered(bob())), 2);

        assert!(first.recv().await.is_some());
        assert!(second.recv().await.is_some());
    }

    #[tokio::test]
    async fn dropped_subscribers_are_pruned() {
        let backend = MockBackend::new();
        let rx = backend.subscribe(EventChannel::MessageReceived).await.unwrap();
        assert_eq!(backend.subscriber_count(EventChannel::MessageReceived), 1);

        drop(rx);

        assert_eq!(backend.subscriber_count(EventChannel::MessageReceived), 0);
        assert_eq!(
            backend.emit_raw(EventChannel::MessageReceived, serde_json::json!({})),
            0
        );
    }

    #[tokio::test]
    async fn emit_during_fires_inside_the_call() {
        let backend = MockBackend::new();
        let mut rx = backend.subscribe(EventChannel::PeerDiscovered).await.unwrap();
        backend.emit_during("list_peers", ChatEvent::PeerDiscovered(bob()));

        assert!(rx.try_recv().is_err());
        let snapshot = backend.list_peers().await.unwrap();

        assert!(snapshot.is_empty());
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn calls_are_logged_in_order() {
        let backend = MockBackend::new();
        backend.subscribe(EventChannel::PeerDiscovered).await.unwrap();
        backend.list_peers().await.unwrap();

        assert_eq!(backend.calls(), vec!["subscribe:peer-discovered", "list_peers"]);
    }

    #[tokio::test]
    async fn forced_subscribe_failure_targets_one_channel() {
        let backend = MockBackend::new();
        backend.fail_next(
            "subscribe:message-received",
            GatewayError::Transport("refused".into()),
        );

        assert!(backend.subscribe(EventChannel::PeerDiscovered).await.is_ok());
        assert!(backend.subscribe(EventChannel::MessageReceived).await.is_err());
        assert!(backend.subscribe(EventChannel::MessageReceived).await.is_ok());
    }
}
