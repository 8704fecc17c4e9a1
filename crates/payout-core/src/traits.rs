use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{BuildError, GatewayError, StoreError};
use crate::types::{SubmitOutcome, TransferPayload, WithdrawalRequest};

/// Durable store of withdrawal requests and transaction records.
///
/// The orchestrator relies on `claim_pending` being atomic: for a
/// given id, exactly one concurrent caller may win the
/// `pending -> processing` transition. Everything else in the
/// concurrency story hangs off that guarantee.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load a withdrawal by id without mutating it.
    async fn fetch(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError>;

    /// Atomically transition `pending -> processing` and return the
    /// claimed record. `Ok(None)` means the record is absent or not
    /// pending; callers disambiguate with `fetch`.
    async fn claim_pending(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError>;

    /// Release a claim: `processing -> pending`. Used when a retryable
    /// failure occurs before anything was broadcast.
    async fn release_claim(&self, id: Uuid) -> Result<(), StoreError>;

    /// Transition a claimed record to `failed`.
    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError>;

    /// Transition `processing -> completed`, recording the transaction
    /// identifier and completion time. Fails with `ConditionFailed`
    /// if the record is no longer in `processing`.
    async fn complete(
        &self,
        id: Uuid,
        transaction_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Sum of all accrual-type ledger entries; zero when empty.
    async fn accrual_total(&self) -> Result<i64, StoreError>;

    /// Sum of amounts of all completed withdrawals; zero when empty.
    async fn completed_payout_total(&self) -> Result<i64, StoreError>;

    /// Attach the transaction identifier to the user's most recently
    /// created transaction-intent record that has none yet. Returns
    /// whether a record was updated.
    async fn link_latest_intent(
        &self,
        user_id: Uuid,
        transaction_id: &str,
    ) -> Result<bool, StoreError>;
}

/// Remote ledger network operations the orchestrator depends on.
#[async_trait]
pub trait NetworkGateway: Send + Sync {
    /// Current network time-window reference. Windows are
    /// time-sensitive; implementations must not cache across calls.
    async fn current_window(&self) -> Result<u64, GatewayError>;

    /// Broadcast a signed payload.
    async fn submit(&self, payload: &TransferPayload) -> Result<SubmitOutcome, GatewayError>;
}

/// Produces signed transfer payloads from the treasury identity.
///
/// The treasury key lives inside the builder; this trait is the single
/// identity-derivation entry point for the rest of the system.
pub trait TransferBuilder: Send + Sync {
    /// Public identity of the treasury (base58).
    fn treasury_id(&self) -> String;

    /// Build a signed transfer valid up to `target_window`. The
    /// payload's transaction identifier is deterministic for a given
    /// input tuple, usable for reconciliation before confirmation.
    fn build(
        &self,
        destination: &str,
        amount: i64,
        target_window: u64,
    ) -> Result<TransferPayload, BuildError>;
}
