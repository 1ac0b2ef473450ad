//! Event bridge: backend push channels into the store.
//!
//! [`EventBridge::attach`] subscribes once to every [`EventChannel`] and
//! spawns one forwarding task per channel. Each task decodes payloads and
//! applies them to the store in the order the backend sent them; there is no
//! ordering across channels. Payloads that do not decode are dropped with a
//! warning.
//!
//! The bridge refuses a second attach while a [`Subscription`] is live.
//! Releasing (or dropping) the subscription is the single teardown point.

use crate::gateway::{Backend, EventStream, Gateway, GatewayError};
use crate::handle::StoreHandle;
use lanchat_sync_types::{ChatEvent, EventChannel};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Bridge errors.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Listeners are already attached through this bridge.
    #[error("event listeners already attached")]
    AlreadyAttached,

    /// A channel subscription was refused.
    #[error("failed to subscribe to {channel}: {source}")]
    Subscribe {
        /// The channel that could not be subscribed.
        channel: EventChannel,
        /// Gateway failure.
        #[source]
        source: GatewayError,
    },
}

/// Counts of payloads the forwarding tasks have handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BridgeStats {
    /// Payloads decoded and applied to the store.
    pub delivered: u64,
    /// Payloads dropped because they did not decode.
    pub dropped: u64,
}

impl BridgeStats {
    /// Every payload handled, delivered or dropped.
    pub fn total(&self) -> u64 {
        self.delivered + self.dropped
    }
}

#[derive(Debug, Default)]
struct Counters {
    delivered: AtomicU64,
    dropped: AtomicU64,
    progress: Notify,
}

/// Attaches backend push channels to a store.
///
/// Clones share the attachment guard and counters.
#[derive(Debug, Clone, Default)]
pub struct EventBridge {
    attached: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

impl EventBridge {
    /// Create a detached bridge.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every channel and forward events into `store`.
    ///
    /// Fails with [`BridgeError::AlreadyAttached`] without subscribing
    /// anything if a previous subscription is still live. If one channel
    /// refuses, the channels already subscribed are released.
    pub async fn attach<B: Backend>(
        &self,
        gateway: &Gateway<B>,
        store: StoreHandle,
    ) -> Result<Subscription, BridgeError> {
        if self
            .attached
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(BridgeError::AlreadyAttached);
        }

        // Dropped on early return, which aborts the tasks and clears the guard.
        let mut subscription = Subscription {
            tasks: Vec::with_capacity(EventChannel::ALL.len()),
            attached: Arc::clone(&self.attached),
        };

        for channel in EventChannel::ALL {
            let stream = gateway
                .subscribe(channel)
                .await
                .map_err(|source| BridgeError::Subscribe { channel, source })?;
            subscription.tasks.push(tokio::spawn(forward(
                channel,
                stream,
                store.clone(),
                Arc::clone(&self.counters),
            )));
        }

        tracing::debug!("Event bridge attached ({} channels)", subscription.tasks.len());
        Ok(subscription)
    }

    /// Whether a subscription is currently live.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    /// Counts of handled payloads since the bridge was created.
    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            delivered: self.counters.delivered.load(Ordering::SeqCst),
            dropped: self.counters.dropped.load(Ordering::SeqCst),
        }
    }

    /// Wait until at least `total` payloads have been handled.
    ///
    /// Returns `false` if `timeout` elapses first.
    pub async fn wait_for(&self, total: u64, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let progressed = self.counters.progress.notified();
            if self.stats().total() >= total {
                return true;
            }
            if tokio::time::timeout_at(deadline, progressed).await.is_err() {
                return self.stats().total() >= total;
            }
        }
    }
}

async fn forward(
    channel: EventChannel,
    mut stream: EventStream,
    store: StoreHandle,
    counters: Arc<Counters>,
) {
    while let Some(payload) = stream.recv().await {
        match ChatEvent::decode(channel, payload) {
            Ok(event) => {
                store.apply(event).await;
                counters.delivered.fetch_add(1, Ordering::SeqCst);
            }
            Err(e) => {
                tracing::warn!("Dropping {} event: {}", channel, e);
                counters.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
        counters.progress.notify_waiters();
    }
    tracing::debug!("Event channel closed: {}", channel);
}

/// Live listener registration returned by [`EventBridge::attach`].
///
/// Dropping it aborts the forwarding tasks and lets the bridge attach again.
#[derive(Debug)]
pub struct Subscription {
    tasks: Vec<JoinHandle<()>>,
    attached: Arc<AtomicBool>,
}

impl Subscription {
    /// Number of channels this subscription listens on.
    pub fn channel_count(&self) -> usize {
        self.tasks.len()
    }

    /// Release every listener.
    pub fn release(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
        self.attached.store(false, Ordering::SeqCst);
        tracing::debug!("Event bridge released");
    }
}
