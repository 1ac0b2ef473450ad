//! # sync-types
//!
//! Entity model for the LAN chat sync layer.
//!
//! This crate provides the shapes shared by every other crate:
//! - [`Profile`], [`Peer`], [`Message`], [`Transfer`] - the entities
//! - [`UserId`], [`MessageId`], [`TransferId`], [`SessionId`] - identities
//! - [`ChatEvent`] / [`EventChannel`] - push events and their wire names
//! - [`DecodeError`] - payload decoding failures
//!
//! Field names and enum variants match the backend's JSON payloads.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod events;
mod ids;
mod message;
mod profile;
mod transfer;

pub use error::DecodeError;
pub use events::{ChatEvent, EventChannel, StatusUpdate};
pub use ids::{MessageId, SessionId, TransferId, UserId};
pub use message::{compare_timestamp, involves_conversation, Message, MessageStatus, MessageType};
pub use profile::{NetworkAddress, Peer, Profile, UserStatus};
pub use transfer::{Transfer, TransferStatus};
