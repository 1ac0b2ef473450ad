//! # sync-client
//!
//! Client-side state synchronization for LAN chat.
//!
//! This is the library presentation code uses to talk to the networking
//! backend and keep a consistent local model of the chat session.
//!
//! ## Features
//!
//! - **Backend Abstraction**: [`Backend`] trait with a typed [`Gateway`] front
//! - **Event Bridge**: push channels decoded and applied to the store in order
//! - **Race-free Bootstrap**: listeners attach before any snapshot is pulled
//! - **Pure State Machine**: uses sync-core for the store and bootstrap logic
//!
//! ## Example
//!
//! ```ignore
//! use lanchat_sync_client::{ChatSession, MockBackend, SessionConfig};
//!
//! let session = ChatSession::new(MockBackend::new(), SessionConfig::default());
//! session.initialize("alice", "Alice A").await?;
//!
//! let peers = session.read(|s| s.peers().to_vec()).await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bridge;
pub mod gateway;
pub mod handle;
pub mod session;

pub use bridge::{BridgeError, BridgeStats, EventBridge, Subscription};
pub use gateway::{Backend, EventStream, Gateway, GatewayError, MockBackend};
pub use handle::StoreHandle;
pub use session::{
    ChatSession, SessionConfig, SessionError, DEFAULT_UPDATE_CAPACITY, MIN_REFRESH_INTERVAL,
};
