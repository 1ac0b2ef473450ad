//! File transfers.

use serde::{Deserialize, Serialize};

use crate::{TransferId, UserId};

/// Lifecycle status of a file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    /// Offered, waiting for the recipient to respond.
    Pending,
    /// Accepted by the recipient, bytes not yet flowing.
    Accepted,
    /// Bytes are flowing.
    InProgress,
    /// Temporarily halted.
    Paused,
    /// All bytes delivered and verified.
    Completed,
    /// Aborted by an error.
    Failed,
    /// Rejected or cancelled by either side.
    Cancelled,
}

impl TransferStatus {
    /// Terminal states admit no further mutation.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransferStatus::Completed | TransferStatus::Failed | TransferStatus::Cancelled
        )
    }

    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// `InProgress → InProgress` is allowed: it is how progress is reported.
    pub fn can_transition_to(self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        match self {
            Pending => matches!(next, Accepted | InProgress | Failed | Cancelled),
            Accepted => matches!(next, InProgress | Completed | Failed | Cancelled),
            InProgress => matches!(next, InProgress | Paused | Completed | Failed | Cancelled),
            Paused => matches!(next, InProgress | Failed | Cancelled),
            Completed | Failed | Cancelled => false,
        }
    }
}

/// A file exchange between two users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Identity.
    pub transfer_id: TransferId,
    /// Who offers the file.
    pub sender_id: UserId,
    /// Who receives the file.
    pub recipient_id: UserId,
    /// File name without directories.
    pub file_name: String,
    /// Total size in bytes.
    pub file_size: u64,
    /// Content hash of the file.
    pub file_hash: String,
    /// Bytes delivered so far.
    #[serde(default)]
    pub bytes_transferred: u64,
    /// Lifecycle status.
    pub status: TransferStatus,
    /// Failure description, populated when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Transfer {
    /// Create a pending transfer with no bytes delivered.
    pub fn pending(
        transfer_id: TransferId,
        sender_id: UserId,
        recipient_id: UserId,
        file_name: impl Into<String>,
        file_size: u64,
        file_hash: impl Into<String>,
    ) -> Self {
        Self {
            transfer_id,
            sender_id,
            recipient_id,
            file_name: file_name.into(),
            file_size,
            file_hash: file_hash.into(),
            bytes_transferred: 0,
            status: TransferStatus::Pending,
            error: None,
        }
    }

    /// Fraction of the file delivered, in `0.0..=1.0`.
    ///
    /// Empty files report `1.0` once completed and `0.0` otherwise.
    pub fn progress(&self) -> f64 {
        if self.file_size == 0 {
            return if self.status == TransferStatus::Completed {
                1.0
            } else {
                0.0
            };
        }
        (self.bytes_transferred as f64 / self.file_size as f64).clamp(0.0, 1.0)
    }
}
