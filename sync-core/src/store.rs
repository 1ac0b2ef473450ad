//! The synchronization store.
//!
//! [`SyncStore`] is the authoritative in-memory model of the chat session:
//! the local profile, known peers, the message timeline, file transfers and
//! the UI's active conversation. Push events and snapshot pulls both go
//! through the same merge operations, so the final state does not depend on
//! whether an entity was first seen in an event or in a snapshot:
//!
//! - peers and transfers are keyed by identity and replaced in place
//! - messages are appended once per id, in arrival order
//! - a snapshot that resolves after events were applied is merged, never
//!   allowed to overwrite them
//!
//! Every mutation returns an `Option<StoreChange>` (`None` means the call was
//! a no-op) so the caller can notify presentation without diffing.

use std::collections::{HashMap, HashSet};

use lanchat_sync_types::{
    compare_timestamp, involves_conversation, ChatEvent, Message, MessageId, MessageStatus, Peer,
    Profile, Transfer, TransferId, TransferStatus, UserId,
};

/// A change applied to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// The local profile was set or replaced.
    ProfileSet(UserId),
    /// A new peer was added.
    PeerInserted(UserId),
    /// An existing peer was replaced in place.
    PeerUpdated(UserId),
    /// A peer was removed.
    PeerRemoved(UserId),
    /// A message was appended to the timeline.
    MessageAppended(MessageId),
    /// A message's delivery status moved forward.
    MessageStatusAdvanced {
        /// The message.
        message_id: MessageId,
        /// Status before the change.
        from: MessageStatus,
        /// Status after the change.
        to: MessageStatus,
    },
    /// A message snapshot was merged into the timeline.
    MessagesMerged {
        /// Messages that were not present before.
        added: usize,
        /// Existing messages whose status the snapshot moved forward.
        advanced: usize,
    },
    /// A new transfer was added.
    TransferInserted(TransferId),
    /// An existing transfer was replaced in place.
    TransferUpdated {
        /// The transfer.
        transfer_id: TransferId,
        /// Status before the change.
        from: TransferStatus,
        /// Status after the change.
        to: TransferStatus,
    },
    /// The active conversation selection changed.
    ActiveConversationChanged(Option<UserId>),
}

impl StoreChange {
    /// Whether this change moved a transfer along a path the lifecycle
    /// table does not allow (e.g. out of a terminal state).
    ///
    /// The store trusts the backend and applies such updates anyway; this
    /// lets the caller report them.
    pub fn violates_lifecycle(&self) -> bool {
        match self {
            StoreChange::TransferUpdated { from, to, .. } => {
                from != to && !from.can_transition_to(*to)
            }
            _ => false,
        }
    }
}

/// Authoritative, single-owner model of the chat session.
///
/// The store does no locking of its own. Callers that share it across tasks
/// wrap it in a mutex so each operation is atomic.
#[derive(Debug, Default, Clone)]
pub struct SyncStore {
    profile: Option<Profile>,
    peers: Vec<Peer>,
    messages: Vec<Message>,
    /// Position of every message in `messages`, by id.
    message_index: HashMap<MessageId, usize>,
    transfers: Vec<Transfer>,
    active_conversation: Option<UserId>,
}

impl SyncStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    // ===========================================
    // Profile
    // ===========================================

    /// Set the local user's profile.
    pub fn set_profile(&mut self, profile: Profile) -> Option<StoreChange> {
        if self.profile.as_ref() == Some(&profile) {
            return None;
        }
        let user_id = profile.user_id.clone();
        self.profile = Some(profile);
        Some(StoreChange::ProfileSet(user_id))
    }

    /// The local user's profile, once identity is initialized.
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    /// The local user's id, once identity is initialized.
    pub fn local_user_id(&self) -> Option<&UserId> {
        self.profile.as_ref().map(|p| &p.user_id)
    }

    // ===========================================
    // Peers
    // ===========================================

    /// Insert a peer, or replace the one with the same `user_id` in place.
    pub fn upsert_peer(&mut self, peer: Peer) -> Option<StoreChange> {
        let user_id = peer.user_id().clone();
        match self.peers.iter_mut().find(|p| p.user_id() == &user_id) {
            Some(existing) if *existing == peer => None,
            Some(existing) => {
                *existing = peer;
                Some(StoreChange::PeerUpdated(user_id))
            }
            None => {
                self.peers.push(peer);
                Some(StoreChange::PeerInserted(user_id))
            }
        }
    }

    /// Merge a peer snapshot.
    ///
    /// Entries are upserted, except that a snapshot entry never replaces a
    /// peer last seen more recently (a sighting that raced the pull).
    pub fn merge_peers(&mut self, snapshot: Vec<Peer>) -> Vec<StoreChange> {
        let mut changes = Vec::new();
        for peer in snapshot {
            let stale = self
                .peer(peer.user_id())
                .is_some_and(|existing| existing.last_seen > peer.last_seen);
            if stale {
                continue;
            }
            changes.extend(self.upsert_peer(peer));
        }
        changes
    }

    /// Remove a peer by id. No-op if absent.
    pub fn remove_peer(&mut self, user_id: &UserId) -> Option<StoreChange> {
        let index = self.peers.iter().position(|p| p.user_id() == user_id)?;
        self.peers.remove(index);
        Some(StoreChange::PeerRemoved(user_id.clone()))
    }

    /// All known peers, in first-seen order.
    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    /// Look up a peer by id.
    pub fn peer(&self, user_id: &UserId) -> Option<&Peer> {
        self.peers.iter().find(|p| p.user_id() == user_id)
    }

    // ===========================================
    // Messages
    // ===========================================

    /// Append a message to the timeline.
    ///
    /// A message whose id is already present is a duplicate delivery (for
    /// example the same message seen in an event and in a later snapshot)
    /// and is ignored.
    pub fn append_message(&mut self, message: Message) -> Option<StoreChange> {
        if self.message_index.contains_key(&message.id) {
            return None;
        }
        let id = message.id.clone();
        self.push_message(message);
        Some(StoreChange::MessageAppended(id))
    }

    /// Load a message snapshot.
    ///
    /// On an empty timeline this is a plain load. Otherwise the snapshot is
    /// merged as a union by id: snapshot order first, then any message
    /// appended earlier that the snapshot does not contain. For messages in
    /// both, the status only ever moves forward.
    pub fn set_messages(&mut self, snapshot: Vec<Message>) -> Option<StoreChange> {
        let previous = std::mem::take(&mut self.messages);
        self.message_index.clear();

        let known: HashMap<MessageId, MessageStatus> =
            previous.iter().map(|m| (m.id.clone(), m.status)).collect();
        let mut advanced = 0;

        for mut message in snapshot {
            if self.message_index.contains_key(&message.id) {
                continue;
            }
            if let Some(&status) = known.get(&message.id) {
                if status.can_advance_to(message.status) {
                    advanced += 1;
                } else {
                    message.status = status;
                }
            }
            self.push_message(message);
        }

        for message in previous {
            if !self.message_index.contains_key(&message.id) {
                self.push_message(message);
            }
        }

        let added = self.messages.len() - known.len();
        (added > 0 || advanced > 0).then_some(StoreChange::MessagesMerged { added, advanced })
    }

    /// Move a message's status forward.
    ///
    /// Ignored when the message is unknown or the transition would regress.
    pub fn advance_message_status(
        &mut self,
        message_id: &MessageId,
        status: MessageStatus,
    ) -> Option<StoreChange> {
        let index = *self.message_index.get(message_id)?;
        let message = &mut self.messages[index];
        let from = message.status;
        if !from.can_advance_to(status) {
            return None;
        }
        message.status = status;
        Some(StoreChange::MessageStatusAdvanced {
            message_id: message_id.clone(),
            from,
            to: status,
        })
    }

    /// The whole timeline, in arrival order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Look up a message by id.
    pub fn message(&self, message_id: &MessageId) -> Option<&Message> {
        self.message_index
            .get(message_id)
            .map(|&index| &self.messages[index])
    }

    /// Messages exchanged between the local user and `peer_id`, in either
    /// direction, in chronological order.
    ///
    /// Computed on every call. Empty until the local profile is set.
    pub fn conversation_messages(&self, peer_id: &UserId) -> Vec<&Message> {
        let Some(local_id) = self.local_user_id() else {
            return Vec::new();
        };
        let mut conversation: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| involves_conversation(m, local_id, peer_id))
            .collect();
        conversation.sort_by(|a, b| compare_timestamp(a, b));
        conversation
    }

    /// Messages of the active conversation, if one is selected.
    pub fn active_conversation_messages(&self) -> Vec<&Message> {
        match &self.active_conversation {
            Some(peer_id) => self.conversation_messages(peer_id),
            None => Vec::new(),
        }
    }

    /// Ids of every user the local user has exchanged messages with.
    pub fn conversation_partners(&self) -> Vec<UserId> {
        let Some(local_id) = self.local_user_id() else {
            return Vec::new();
        };
        let mut seen = HashSet::new();
        let mut partners = Vec::new();
        for message in &self.messages {
            let partner = if &message.sender_id == local_id {
                &message.recipient_id
            } else if &message.recipient_id == local_id {
                &message.sender_id
            } else {
                continue;
            };
            if seen.insert(partner.clone()) {
                partners.push(partner.clone());
            }
        }
        partners
    }

    fn push_message(&mut self, message: Message) {
        self.message_index
            .insert(message.id.clone(), self.messages.len());
        self.messages.push(message);
    }

    // ===========================================
    // Transfers
    // ===========================================

    /// Insert a transfer, or replace the one with the same id in place.
    ///
    /// Status transitions are not validated here; see
    /// [`StoreChange::violates_lifecycle`].
    pub fn upsert_transfer(&mut self, transfer: Transfer) -> Option<StoreChange> {
        let transfer_id = transfer.transfer_id.clone();
        match self
            .transfers
            .iter_mut()
            .find(|t| t.transfer_id == transfer_id)
        {
            Some(existing) if *existing == transfer => None,
            Some(existing) => {
                let from = existing.status;
                let to = transfer.status;
                *existing = transfer;
                Some(StoreChange::TransferUpdated {
                    transfer_id,
                    from,
                    to,
                })
            }
            None => {
                self.transfers.push(transfer);
                Some(StoreChange::TransferInserted(transfer_id))
            }
        }
    }

    /// Merge a transfer snapshot.
    ///
    /// Entries are upserted unless the snapshot is behind the local entry:
    /// a terminal transfer is never replaced, and neither is one whose
    /// status cannot reach the snapshot's or that has moved more bytes.
    pub fn merge_transfers(&mut self, snapshot: Vec<Transfer>) -> Vec<StoreChange> {
        let mut changes = Vec::new();
        for transfer in snapshot {
            let stale = self
                .transfer(&transfer.transfer_id)
                .is_some_and(|existing| Self::is_behind(existing, &transfer));
            if stale {
                continue;
            }
            changes.extend(self.upsert_transfer(transfer));
        }
        changes
    }

    fn is_behind(existing: &Transfer, snapshot: &Transfer) -> bool {
        if existing.status.is_terminal() {
            return true;
        }
        let unreachable = existing.status != snapshot.status
            && !existing.status.can_transition_to(snapshot.status);
        unreachable || existing.bytes_transferred > snapshot.bytes_transferred
    }

    /// All transfers, in first-seen order.
    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Look up a transfer by id.
    pub fn transfer(&self, transfer_id: &TransferId) -> Option<&Transfer> {
        self.transfers.iter().find(|t| &t.transfer_id == transfer_id)
    }

    /// Incoming offers waiting for the local user to accept or reject.
    pub fn pending_transfers(&self) -> Vec<&Transfer> {
        let Some(local_id) = self.local_user_id() else {
            return Vec::new();
        };
        self.transfers
            .iter()
            .filter(|t| t.status == TransferStatus::Pending && &t.recipient_id == local_id)
            .collect()
    }

    // ===========================================
    // UI selection
    // ===========================================

    /// Select the conversation shown by the UI, or clear the selection.
    pub fn set_active_conversation(&mut self, peer_id: Option<UserId>) -> Option<StoreChange> {
        if self.active_conversation == peer_id {
            return None;
        }
        self.active_conversation = peer_id.clone();
        Some(StoreChange::ActiveConversationChanged(peer_id))
    }

    /// The selected conversation partner.
    pub fn active_conversation(&self) -> Option<&UserId> {
        self.active_conversation.as_ref()
    }

    // ===========================================
    // Events
    // ===========================================

    /// Apply a decoded push event.
    pub fn apply(&mut self, event: ChatEvent) -> Option<StoreChange> {
        match event {
            ChatEvent::PeerDiscovered(peer) => self.upsert_peer(peer),
            ChatEvent::MessageReceived(message) => self.append_message(message),
            ChatEvent::TransferRequested(transfer) | ChatEvent::TransferUpdated(transfer) => {
                self.upsert_transfer(transfer)
            }
            ChatEvent::MessageStatusChanged(update) => {
                self.advance_message_status(&update.message_id, update.status)
            }
        }
    }
}
