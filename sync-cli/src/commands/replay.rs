//! Replay a scripted backend through a real session.
//!
//! The script seeds a mock backend with snapshots and lists raw push events
//! (malformed ones included). The session bootstraps against it, the events
//! are delivered through the bridge, and the resulting model is printed.

use anyhow::{Context, Result};
use lanchat_sync_client::{BridgeStats, ChatSession, MockBackend};
use lanchat_sync_core::SyncStore;
use lanchat_sync_types::{
    EventChannel, Message, MessageStatus, Peer, Profile, Transfer, TransferStatus, UserId,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;

/// How long to wait for scripted events to pass through the bridge.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// A replay script.
#[derive(Debug, Default, Deserialize)]
pub struct Script {
    /// Local user id the backend assigns (random if absent).
    #[serde(default)]
    pub user_id: Option<UserId>,
    /// Peer snapshot.
    #[serde(default)]
    pub peers: Vec<Peer>,
    /// Message snapshot.
    #[serde(default)]
    pub messages: Vec<Message>,
    /// Transfer snapshot.
    #[serde(default)]
    pub transfers: Vec<Transfer>,
    /// Push events delivered after bootstrap, in order.
    #[serde(default)]
    pub events: Vec<ScriptEvent>,
    /// Conversation to select once events are applied.
    #[serde(default)]
    pub active_conversation: Option<UserId>,
}

/// One raw push event.
#[derive(Debug, Deserialize)]
pub struct ScriptEvent {
    /// Channel wire name, e.g. `message-received`.
    pub channel: String,
    /// Payload as the backend would send it.
    pub payload: serde_json::Value,
}

impl Script {
    /// Load a script from a JSON file.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read script {}", path.display()))?;
        serde_json::from_str(&contents).context("Invalid replay script")
    }
}

/// Resulting model after a replay.
#[derive(Debug, Serialize)]
pub struct Report {
    /// Local profile.
    pub profile: Option<Profile>,
    /// Known peers.
    pub peers: Vec<PeerLine>,
    /// One entry per conversation partner.
    pub conversations: Vec<Conversation>,
    /// Every transfer.
    pub transfers: Vec<TransferLine>,
    /// Incoming offers awaiting a response.
    pub pending_offers: usize,
    /// Messages of the selected conversation.
    pub active_conversation: Option<Conversation>,
    /// Event delivery counts.
    pub events: EventCounts,
}

/// Peer summary.
#[derive(Debug, Serialize)]
pub struct PeerLine {
    /// Peer id.
    pub user_id: UserId,
    /// Display name.
    pub display_name: String,
    /// `ip:port`.
    pub address: String,
}

/// Chronological conversation with one peer.
#[derive(Debug, Serialize)]
pub struct Conversation {
    /// The other participant.
    pub peer_id: UserId,
    /// Messages, oldest first.
    pub messages: Vec<MessageLine>,
}

/// Message summary.
#[derive(Debug, Serialize)]
pub struct MessageLine {
    /// Sender id.
    pub from: UserId,
    /// Text content.
    pub content: String,
    /// Delivery status.
    pub status: MessageStatus,
}

/// Transfer summary.
#[derive(Debug, Serialize)]
pub struct TransferLine {
    /// File name.
    pub file_name: String,
    /// Lifecycle status.
    pub status: TransferStatus,
    /// Percent delivered.
    pub percent: u8,
    /// Failure description.
    pub error: Option<String>,
}

/// Event delivery counts.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct EventCounts {
    /// Applied to the store.
    pub delivered: u64,
    /// Dropped by the bridge as undecodable.
    pub dropped: u64,
    /// Not sent because the channel name is unknown.
    pub skipped: u64,
}

impl Report {
    fn from_store(store: &SyncStore, stats: BridgeStats, skipped: u64) -> Self {
        let conversation = |peer_id: UserId| Conversation {
            messages: store
                .conversation_messages(&peer_id)
                .into_iter()
                .map(|m| MessageLine {
                    from: m.sender_id.clone(),
                    content: m.content.clone(),
                    status: m.status,
                })
                .collect(),
            peer_id,
        };

        Self {
            profile: store.profile().cloned(),
            peers: store
                .peers()
                .iter()
                .map(|p| PeerLine {
                    user_id: p.user_id().clone(),
                    display_name: p.display_name().to_string(),
                    address: p.address.to_socket_addr().to_string(),
                })
                .collect(),
            conversations: store
                .conversation_partners()
                .into_iter()
                .map(conversation)
                .collect(),
            transfers: store
                .transfers()
                .iter()
                .map(|t| TransferLine {
                    file_name: t.file_name.clone(),
                    status: t.status,
                    percent: (t.progress() * 100.0).round() as u8,
                    error: t.error.clone(),
                })
                .collect(),
            pending_offers: store.pending_transfers().len(),
            active_conversation: store.active_conversation().cloned().map(conversation),
            events: EventCounts {
                delivered: stats.delivered,
                dropped: stats.dropped,
                skipped,
            },
        }
    }
}

/// Run the replay command.
pub async fn run(config: &Config, script_path: &Path, json: bool) -> Result<()> {
    let script = Script::load(script_path).await?;
    let report = replay(config, script).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Bootstrap a session against the scripted backend and deliver its events.
pub async fn replay(config: &Config, script: Script) -> Result<Report> {
    let backend = MockBackend::new()
        .with_local_user_id(script.user_id.unwrap_or_default())
        .with_peers(script.peers)
        .with_messages(script.messages)
        .with_transfers(script.transfers);
    let session = Arc::new(ChatSession::new(backend.clone(), config.session_config()));

    session
        .initialize(&config.identity.username, &config.identity.display_name)
        .await
        .context("Session bootstrap failed")?;

    let refresh = session
        .config()
        .refresh_interval
        .map(|period| ChatSession::spawn_refresh_task(Arc::clone(&session), period));

    let mut sent = 0u64;
    let mut skipped = 0u64;
    for event in script.events {
        match event.channel.parse::<EventChannel>() {
            Ok(channel) => {
                backend.emit_raw(channel, event.payload);
                sent += 1;
            }
            Err(e) => {
                tracing::warn!("Skipping scripted event: {}", e);
                skipped += 1;
            }
        }
    }

    if !session.bridge().wait_for(sent, DELIVERY_TIMEOUT).await {
        anyhow::bail!(
            "Timed out waiting for {} events ({} handled)",
            sent,
            session.bridge_stats().total()
        );
    }

    if let Some(peer_id) = script.active_conversation {
        session.set_active_conversation(Some(peer_id)).await;
    }

    let stats = session.bridge_stats();
    let report = session
        .read(|store| Report::from_store(store, stats, skipped))
        .await;

    if let Some(task) = refresh {
        task.abort();
    }
    session.teardown().await;
    Ok(report)
}

fn print_report(report: &Report) {
    println!("=== lanchat replay ===");
    println!();

    match &report.profile {
        Some(profile) => {
            println!("Profile:");
            println!("  ID:      {}", profile.user_id);
            println!("  Name:    {} ({})", profile.display_name, profile.username);
            println!("  Status:  {:?}", profile.status);
        }
        None => println!("Profile: NOT INITIALIZED"),
    }
    println!();

    println!("Peers: {}", report.peers.len());
    for peer in &report.peers {
        println!("  {} [{}] at {}", peer.display_name, peer.user_id, peer.address);
    }
    println!();

    println!("Conversations: {}", report.conversations.len());
    for conversation in &report.conversations {
        println!("  with {}:", conversation.peer_id);
        for line in &conversation.messages {
            println!("    {}: {} ({:?})", line.from, line.content, line.status);
        }
    }
    println!();

    println!(
        "Transfers: {} ({} awaiting response)",
        report.transfers.len(),
        report.pending_offers
    );
    for transfer in &report.transfers {
        match &transfer.error {
            Some(error) => println!(
                "  {} {:?} {}% - {}",
                transfer.file_name, transfer.status, transfer.percent, error
            ),
            None => println!(
                "  {} {:?} {}%",
                transfer.file_name, transfer.status, transfer.percent
            ),
        }
    }
    println!();

    if let Some(active) = &report.active_conversation {
        println!(
            "Active conversation: {} ({} messages)",
            active.peer_id,
            active.messages.len()
        );
        println!();
    }

    println!("Events:");
    println!("  Delivered: {}", report.events.delivered);
    println!("  Dropped:   {}", report.events.dropped);
    println!("  Skipped:   {}", report.events.skipped);
}
