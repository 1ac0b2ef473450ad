//! Shared access to the synchronization store.
//!
//! The store itself is a plain single-owner value. [`StoreHandle`] puts it
//! behind a `tokio::sync::Mutex` so event delivery and snapshot merges never
//! interleave inside one operation, and broadcasts every resulting
//! [`StoreChange`] to presentation.

use lanchat_sync_core::{StoreChange, SyncStore};
use lanchat_sync_types::ChatEvent;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Cloneable handle to a shared [`SyncStore`].
#[derive(Debug, Clone)]
pub struct StoreHandle {
    store: Arc<Mutex<SyncStore>>,
    updates: broadcast::Sender<StoreChange>,
}

impl StoreHandle {
    /// Create a handle around an empty store.
    ///
    /// `capacity` bounds how many changes a slow update receiver can fall
    /// behind before it starts missing them.
    pub fn new(capacity: usize) -> Self {
        Self::from_store(SyncStore::new(), capacity)
    }

    /// Create a handle around an existing store.
    pub fn from_store(store: SyncStore, capacity: usize) -> Self {
        let (updates, _) = broadcast::channel(capacity.max(1));
        Self {
            store: Arc::new(Mutex::new(store)),
            updates,
        }
    }

    /// Apply a push event atomically.
    pub async fn apply(&self, event: ChatEvent) -> Option<StoreChange> {
        let change = self.store.lock().await.apply(event);
        if let Some(change) = &change {
            self.publish(change.clone());
        }
        change
    }

    /// Run one or more store operations atomically and publish the changes.
    pub async fn mutate<F, C>(&self, f: F) -> Vec<StoreChange>
    where
        F: FnOnce(&mut SyncStore) -> C,
        C: IntoIterator<Item = StoreChange>,
    {
        let changes: Vec<StoreChange> = {
            let mut store = self.store.lock().await;
            f(&mut store).into_iter().collect()
        };
        for change in &changes {
            self.publish(change.clone());
        }
        changes
    }

    /// Read from the store under the lock.
    pub async fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&SyncStore) -> R,
    {
        let store = self.store.lock().await;
        f(&store)
    }

    /// A copy of the whole store.
    pub async fn snapshot(&self) -> SyncStore {
        self.store.lock().await.clone()
    }

    /// Receive every change applied from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.updates.subscribe()
    }

    fn publish(&self, change: StoreChange) {
        if change.violates_lifecycle() {
            tracing::warn!("Transfer lifecycle violation applied: {:?}", change);
        }
        // No receivers is fine; presentation may not be listening yet.
        let _ = self.updates.send(change);
    }
}
