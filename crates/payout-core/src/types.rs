use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a withdrawal record.
///
/// `Processing` is the transient claim state used to serialize
/// concurrent attempts; `Completed` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Processing => "processing",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(WithdrawalStatus::Pending),
            "processing" => Some(WithdrawalStatus::Processing),
            "completed" => Some(WithdrawalStatus::Completed),
            "failed" => Some(WithdrawalStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, WithdrawalStatus::Completed | WithdrawalStatus::Failed)
    }
}

impl std::fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user payout request as stored in the record store.
///
/// Created by an upstream intake process; this service only moves it
/// through the status lifecycle and attaches the resulting
/// transaction identifier.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: Uuid,
    pub user_id: Uuid,
    /// Destination address on the ledger network.
    pub destination: String,
    /// Amount in the network's base unit; always positive.
    pub amount: i64,
    pub status: WithdrawalStatus,
    pub transaction_id: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Kinds of historical ledger entries relevant to balance accounting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerEntryKind {
    /// Revenue-generating activity; feeds the distributable total.
    Accrual,
    /// A past payout entry; ignored by the balance formula (completed
    /// withdrawals are summed from the withdrawal records instead).
    Withdrawal,
}

impl LedgerEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryKind::Accrual => "accrual",
            LedgerEntryKind::Withdrawal => "withdrawal",
        }
    }
}

/// Read-only ledger entry, consumed only in aggregate.
#[derive(Clone, Debug)]
pub struct LedgerEntry {
    pub kind: LedgerEntryKind,
    pub amount: i64,
}

/// A signed, broadcastable transfer.
///
/// Ephemeral: lives for one processing attempt. Only `transaction_id`
/// is ever persisted; it is derived deterministically at build time so
/// an ambiguous broadcast can be reconciled before any retry.
#[derive(Clone, Debug)]
pub struct TransferPayload {
    pub bytes: Vec<u8>,
    pub transaction_id: String,
}

/// Result of submitting a payload to the ledger network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SubmitOutcome {
    pub accepted: bool,
    pub transaction_id: Option<String>,
    pub error: Option<String>,
}
