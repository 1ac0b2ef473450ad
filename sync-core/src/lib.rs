//! # sync-core
//!
//! Pure logic for the LAN chat sync layer (no I/O, instant tests).
//!
//! This crate holds the authoritative client-side model and the bootstrap
//! sequence, without any network, disk or async runtime.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic merges (same events in, same store out)
//! - Easy reasoning about bootstrap ordering
//!
//! The actual I/O (backend calls, event listeners) is performed by
//! `sync-client`, which interprets the actions produced by [`BootstrapState`]
//! and feeds backend results into [`SyncStore`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bootstrap;
pub mod store;

pub use bootstrap::{
    BootstrapAction, BootstrapEvent, BootstrapState, FailedStage, SessionEvent, SnapshotKind,
};
pub use store::{StoreChange, SyncStore};
