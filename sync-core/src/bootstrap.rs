//! Session bootstrap state machine.
//!
//! Bootstrapping a chat session is a fixed sequence: initialize the local
//! identity, attach the push-event listeners, then pull the peer, message
//! and transfer snapshots. Listeners are attached before any snapshot is
//! pulled so no event emitted during the pull can be missed; the store's
//! merge operations absorb the resulting overlap.
//!
//! Like the rest of this crate the machine performs no I/O. It takes an
//! event and returns the next state plus the actions the caller must run.

use std::collections::BTreeSet;

use lanchat_sync_types::UserId;

/// A snapshot pulled from the backend during bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SnapshotKind {
    /// `list_peers`
    Peers,
    /// `list_messages`
    Messages,
    /// `list_transfers`
    Transfers,
}

impl SnapshotKind {
    /// Every snapshot, in pull order.
    pub const ALL: [SnapshotKind; 3] = [
        SnapshotKind::Peers,
        SnapshotKind::Messages,
        SnapshotKind::Transfers,
    ];

    fn pending_all() -> BTreeSet<SnapshotKind> {
        Self::ALL.into_iter().collect()
    }

    fn pull_all() -> Vec<BootstrapAction> {
        Self::ALL
            .into_iter()
            .map(BootstrapAction::PullSnapshot)
            .collect()
    }
}

/// Which bootstrap step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    /// Identity initialization was rejected.
    Identity,
    /// A listener could not be attached.
    Attach,
    /// A snapshot could not be pulled.
    Sync,
}

/// Bootstrap state - NO I/O, just transitions.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BootstrapState {
    /// Nothing done yet.
    #[default]
    Uninitialized,
    /// Identity requested; listeners attach once it succeeds.
    Attaching,
    /// Listeners are live; waiting for the listed snapshots.
    Syncing {
        /// Snapshots not yet merged.
        pending: BTreeSet<SnapshotKind>,
    },
    /// Listeners are live and every snapshot has been merged.
    Ready,
    /// A step failed.
    Failed {
        /// The step that failed.
        stage: FailedStage,
        /// Error message describing the failure.
        error: String,
    },
}

impl BootstrapState {
    /// Create a machine in the `Uninitialized` state.
    pub fn new() -> Self {
        Self::Uninitialized
    }

    /// Process an event and return the new state plus actions to execute.
    ///
    /// Events that make no sense in the current state leave it unchanged and
    /// produce no actions.
    pub fn on_event(self, event: BootstrapEvent) -> (Self, Vec<BootstrapAction>) {
        match (self, event) {
            // Identity
            (
                Self::Uninitialized
                | Self::Failed {
                    stage: FailedStage::Identity,
                    ..
                },
                BootstrapEvent::IdentitySubmitted {
                    username,
                    display_name,
                },
            ) => (
                Self::Attaching,
                vec![BootstrapAction::InitializeIdentity {
                    username,
                    display_name,
                }],
            ),
            (Self::Attaching, BootstrapEvent::IdentityInitialized { user_id }) => (
                Self::Attaching,
                vec![
                    BootstrapAction::EmitEvent(SessionEvent::IdentityReady { user_id }),
                    BootstrapAction::AttachListeners,
                ],
            ),
            (Self::Attaching, BootstrapEvent::IdentityFailed { error }) => {
                fail(FailedStage::Identity, error, vec![])
            }

            // Listeners
            (Self::Attaching, BootstrapEvent::ListenersAttached) => (
                Self::Syncing {
                    pending: SnapshotKind::pending_all(),
                },
                SnapshotKind::pull_all(),
            ),
            (Self::Attaching, BootstrapEvent::AttachFailed { error }) => fail(
                FailedStage::Attach,
                error,
                vec![BootstrapAction::DetachListeners],
            ),

            // Snapshots
            (Self::Syncing { mut pending }, BootstrapEvent::SnapshotMerged(kind)) => {
                pending.remove(&kind);
                if pending.is_empty() {
                    (
                        Self::Ready,
                        vec![BootstrapAction::EmitEvent(SessionEvent::Ready)],
                    )
                } else {
                    (Self::Syncing { pending }, vec![])
                }
            }
            (Self::Syncing { .. }, BootstrapEvent::SnapshotFailed { kind, error }) => fail(
                FailedStage::Sync,
                format!("{kind:?} snapshot: {error}"),
                vec![],
            ),

            // Retry
            (
                Self::Failed {
                    stage: FailedStage::Attach,
                    ..
                },
                BootstrapEvent::RetryRequested,
            ) => (Self::Attaching, vec![BootstrapAction::AttachListeners]),
            (
                Self::Failed {
                    stage: FailedStage::Sync,
                    ..
                },
                BootstrapEvent::RetryRequested,
            ) => (
                Self::Syncing {
                    pending: SnapshotKind::pending_all(),
                },
                SnapshotKind::pull_all(),
            ),

            // Teardown
            (_, BootstrapEvent::TeardownRequested) => (
                Self::Uninitialized,
                vec![
                    BootstrapAction::DetachListeners,
                    BootstrapAction::EmitEvent(SessionEvent::TornDown),
                ],
            ),

            // Invalid transitions - stay in current state
            (state, _) => (state, vec![]),
        }
    }

    /// Whether every snapshot has been merged.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

fn fail(
    stage: FailedStage,
    error: String,
    mut actions: Vec<BootstrapAction>,
) -> (BootstrapState, Vec<BootstrapAction>) {
    actions.push(BootstrapAction::EmitEvent(SessionEvent::Failed {
        stage,
        error: error.clone(),
    }));
    (BootstrapState::Failed { stage, error }, actions)
}

/// Inputs to the bootstrap machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapEvent {
    /// The user submitted an identity.
    IdentitySubmitted {
        /// Unique username.
        username: String,
        /// Name shown to peers.
        display_name: String,
    },
    /// The backend accepted the identity.
    IdentityInitialized {
        /// Id assigned to the local user.
        user_id: UserId,
    },
    /// The backend rejected the identity.
    IdentityFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// Every listener is attached.
    ListenersAttached,
    /// A listener could not be attached.
    AttachFailed {
        /// Error message describing the failure.
        error: String,
    },
    /// A snapshot was pulled and merged into the store.
    SnapshotMerged(SnapshotKind),
    /// A snapshot pull failed.
    SnapshotFailed {
        /// Which snapshot.
        kind: SnapshotKind,
        /// Error message describing the failure.
        error: String,
    },
    /// The caller asked to retry the failed step.
    RetryRequested,
    /// The caller is shutting the session down.
    TeardownRequested,
}

/// Instructions for the session driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapAction {
    /// Call `initialize_identity` on the backend.
    InitializeIdentity {
        /// Unique username.
        username: String,
        /// Name shown to peers.
        display_name: String,
    },
    /// Subscribe every push-event channel.
    AttachListeners,
    /// Pull one snapshot and merge it.
    PullSnapshot(SnapshotKind),
    /// Release every listener.
    DetachListeners,
    /// Notify the application.
    EmitEvent(SessionEvent),
}

/// Notifications for the application layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The local identity is known.
    IdentityReady {
        /// Id assigned to the local user.
        user_id: UserId,
    },
    /// The session is fully synchronized.
    Ready,
    /// Bootstrap failed.
    Failed {
        /// The step that failed.
        stage: FailedStage,
        /// Error message describing the failure.
        error: String,
    },
    /// Listeners were released.
    TornDown,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submitted() -> BootstrapEvent {
        BootstrapEvent::IdentitySubmitted {
            username: "alice".into(),
            display_name: "Alice".into(),
        }
    }

    fn syncing() -> BootstrapState {
        BootstrapState::Syncing {
            pending: SnapshotKind::pending_all(),
        }
    }

    #[test]
    fn starts_uninitialized() {
        assert_eq!(BootstrapState::new(), BootstrapState::Uninitialized);
        assert_eq!(BootstrapState::default(), BootstrapState::Uninitialized);
    }

    #[test]
    fn identity_submission_requests_initialization() {
        let (state, actions) = BootstrapState::new().on_event(submitted());

        assert_eq!(state, BootstrapState::Attaching);
        assert_eq!(
            actions,
            vec![BootstrapAction::InitializeIdentity {
                username: "alice".into(),
                display_name: "Alice".into(),
            }]
        );
    }

    #[test]
    fn identity_success_attaches_listeners_before_any_pull() {
        let (state, actions) = BootstrapState::Attaching.on_event(
            BootstrapEvent::IdentityInitialized {
                user_id: UserId::from("u1"),
            },
        );

        assert_eq!(state, BootstrapState::Attaching);
        assert!(actions.contains(&BootstrapAction::AttachListeners));
        assert!(!actions
            .iter()
            .any(|a| matches!(a, BootstrapAction::PullSnapshot(_))));
        assert!(matches!(
            actions[0],
            BootstrapAction::EmitEvent(SessionEvent::IdentityReady { .. })
        ));
    }

    #[test]
    fn identity_failure_stops_before_listeners() {
        let (state, actions) = BootstrapState::Attaching.on_event(BootstrapEvent::IdentityFailed {
            error: "username taken".into(),
        });

        assert!(matches!(
            state,
            BootstrapState::Failed {
                stage: FailedStage::Identity,
                ..
            }
        ));
        assert!(!actions.contains(&BootstrapAction::AttachListeners));
    }

    #[test]
    fn identity_can_be_resubmitted_after_failure() {
        let failed = BootstrapState::Failed {
            stage: FailedStage::Identity,
            error: "taken".into(),
        };
        let (state, actions) = failed.on_event(submitted());

        assert_eq!(state, BootstrapState::Attaching);
        assert!(matches!(
            actions[0],
            BootstrapAction::InitializeIdentity { .. }
        ));
    }

    #[test]
    fn attached_listeners_trigger_all_pulls() {
        let (state, actions) = BootstrapState::Attaching.on_event(BootstrapEvent::ListenersAttached);

        assert_eq!(state, syncing());
        assert_eq!(
            actions,
            vec![
                BootstrapAction::PullSnapshot(SnapshotKind::Peers),
                BootstrapAction::PullSnapshot(SnapshotKind::Messages),
                BootstrapAction::PullSnapshot(SnapshotKind::Transfers),
            ]
        );
    }

    #[test]
    fn attach_failure_releases_partial_listeners() {
        let (state, actions) = BootstrapState::Attaching.on_event(BootstrapEvent::AttachFailed {
            error: "channel closed".into(),
        });

        assert!(matches!(
            state,
            BootstrapState::Failed {
                stage: FailedStage::Attach,
                ..
            }
        ));
        assert_eq!(actions[0], BootstrapAction::DetachListeners);
    }

    #[test]
    fn ready_after_every_snapshot_merged() {
        let mut state = syncing();
        for kind in [SnapshotKind::Transfers, SnapshotKind::Peers] {
            let (next, actions) = state.on_event(BootstrapEvent::SnapshotMerged(kind));
            assert!(actions.is_empty());
            state = next;
        }
        assert!(!state.is_ready());

        let (state, actions) =
            state.on_event(BootstrapEvent::SnapshotMerged(SnapshotKind::Messages));
        assert!(state.is_ready());
        assert_eq!(
            actions,
            vec![BootstrapAction::EmitEvent(SessionEvent::Ready)]
        );
    }

    #[test]
    fn duplicate_merge_notification_is_harmless() {
        let (state, _) = syncing().on_event(BootstrapEvent::SnapshotMerged(SnapshotKind::Peers));
        let (state, actions) = state.on_event(BootstrapEvent::SnapshotMerged(SnapshotKind::Peers));

        assert!(actions.is_empty());
        assert!(matches!(state, BootstrapState::Syncing { ref pending } if pending.len() == 2));
    }

    #[test]
    fn snapshot_failure_keeps_listeners() {
        let (state, actions) = syncing().on_event(BootstrapEvent::SnapshotFailed {
            kind: SnapshotKind::Messages,
            error: "io".into(),
        });

        assert!(matches!(
            state,
            BootstrapState::Failed {
                stage: FailedStage::Sync,
                ref error,
            } if error.contains("Messages")
        ));
        assert!(!actions.contains(&BootstrapAction::DetachListeners));
    }

    #[test]
    fn retry_after_sync_failure_pulls_again() {
        let failed = BootstrapState::Failed {
            stage: FailedStage::Sync,
            error: "io".into(),
        };
        let (state, actions) = failed.on_event(BootstrapEvent::RetryRequested);

        assert_eq!(state, syncing());
        assert_eq!(actions.len(), 3);
    }

    #[test]
    fn retry_after_attach_failure_reattaches() {
        let failed = BootstrapState::Failed {
            stage: FailedStage::Attach,
            error: "closed".into(),
        };
        let (state, actions) = failed.on_event(BootstrapEvent::RetryRequested);

        assert_eq!(state, BootstrapState::Attaching);
        assert_eq!(actions, vec![BootstrapAction::AttachListeners]);
    }

    #[test]
    fn retry_after_identity_failure_is_ignored() {
        let failed = BootstrapState::Failed {
            stage: FailedStage::Identity,
            error: "taken".into(),
        };
        let (state, actions) = failed.clone().on_event(BootstrapEvent::RetryRequested);

        assert_eq!(state, failed);
        assert!(actions.is_empty());
    }

    #[test]
    fn teardown_from_any_state_detaches() {
        for state in [
            BootstrapState::Uninitialized,
            BootstrapState::Attaching,
            syncing(),
            BootstrapState::Ready,
        ] {
            let (next, actions) = state.on_event(BootstrapEvent::TeardownRequested);
            assert_eq!(next, BootstrapState::Uninitialized);
            assert_eq!(actions[0], BootstrapAction::DetachListeners);
            assert_eq!(
                actions[1],
                BootstrapAction::EmitEvent(SessionEvent::TornDown)
            );
        }
    }

    #[test]
    fn invalid_transition_stays_put() {
        let (state, actions) = BootstrapState::Ready.on_event(submitted());
        assert_eq!(state, BootstrapState::Ready);
        assert!(actions.is_empty());

        let (state, actions) =
            BootstrapState::Uninitialized.on_event(BootstrapEvent::ListenersAttached);
        assert_eq!(state, BootstrapState::Uninitialized);
        assert!(actions.is_empty());
    }
}
