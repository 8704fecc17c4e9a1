use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use payout_core::{NetworkGateway, RecordStore, TransferBuilder};

use crate::balance::BalanceCalculator;
use crate::error::{PayoutError, Result};

/// Outcome of a successfully processed withdrawal.
#[derive(Clone, Debug, Serialize)]
pub struct PayoutReceipt {
    pub transaction_id: String,
    pub explorer_url: String,
}

/// The withdrawal state machine: claim, balance check, window
/// acquisition, build, submit, commit.
///
/// All coordination happens through the record store's conditional
/// transitions; one orchestrator instance serves concurrent requests
/// without any shared mutable state of its own.
pub struct PayoutOrchestrator {
    store: Arc<dyn RecordStore>,
    gateway: Arc<dyn NetworkGateway>,
    builder: Arc<dyn TransferBuilder>,
    balance: BalanceCalculator,
    window_offset: u64,
    explorer_url: String,
}

impl PayoutOrchestrator {
    pub fn new(
        store: Arc<dyn RecordStore>,
        gateway: Arc<dyn NetworkGateway>,
        builder: Arc<dyn TransferBuilder>,
        payout_share_bps: u16,
        window_offset: u64,
        explorer_url: String,
    ) -> Self {
        let balance = BalanceCalculator::new(store.clone(), payout_share_bps);
        Self {
            store,
            gateway,
            builder,
            balance,
            window_offset,
            explorer_url,
        }
    }

    pub fn treasury_id(&self) -> String {
        self.builder.treasury_id()
    }

    pub async fn process(&self, id: Uuid) -> Result<PayoutReceipt> {
        // Claim: pending -> processing, atomic at the store. Exactly
        // one concurrent caller for this id gets the record back.
        let record = match self.store.claim_pending(id).await? {
            Some(record) => record,
            None => {
                return match self.store.fetch(id).await? {
                    None => Err(PayoutError::NotFound),
                    // Covers terminal states and a concurrent claim;
                    // either way this invocation must not proceed.
                    Some(existing) => Err(PayoutError::AlreadyProcessed(existing.status)),
                };
            }
        };
        info!(withdrawal_id = %id, amount = record.amount, "Claimed withdrawal for processing");

        let available = match self.balance.available().await {
            Ok(available) => available,
            Err(err) => {
                self.try_mark_failed(id, &err).await;
                return Err(err);
            }
        };

        if available < record.amount {
            self.try_mark_failed(
                id,
                &PayoutError::InsufficientBalance {
                    available,
                    requested: record.amount,
                },
            )
            .await;
            return Err(PayoutError::InsufficientBalance {
                available,
                requested: record.amount,
            });
        }

        // Windows are time-sensitive; always read fresh.
        let current_window = match self.gateway.current_window().await {
            Ok(window) => window,
            Err(err) => {
                let err = PayoutError::BroadcastFailed(format!("window read failed: {}", err));
                self.release_to_pending(id, &err).await;
                return Err(err);
            }
        };
        let target_window = current_window + self.window_offset;

        let payload = match self
            .builder
            .build(&record.destination, record.amount, target_window)
        {
            Ok(payload) => payload,
            Err(err) => {
                let err = PayoutError::TransferBuildFailed(err.to_string());
                self.release_to_pending(id, &err).await;
                return Err(err);
            }
        };

        // Logged before the broadcast: if the submit outcome is ever
        // ambiguous, this identifier is the reconciliation handle.
        info!(
            withdrawal_id = %id,
            transaction_id = %payload.transaction_id,
            target_window,
            "Built transfer, submitting"
        );

        let outcome = match self.gateway.submit(&payload).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let err = PayoutError::BroadcastFailed(err.to_string());
                self.release_to_pending(id, &err).await;
                return Err(err);
            }
        };

        if !outcome.accepted {
            let detail = outcome
                .error
                .unwrap_or_else(|| "submission not accepted".to_string());
            let err = PayoutError::BroadcastFailed(detail);
            self.release_to_pending(id, &err).await;
            return Err(err);
        }

        let transaction_id = outcome
            .transaction_id
            .unwrap_or_else(|| payload.transaction_id.clone());
        let completed_at = Utc::now();

        if let Err(err) = self.store.complete(id, &transaction_id, completed_at).await {
            // Funds moved but the record disagrees. This is the one
            // path that must reach an operator, not a retry loop.
            error!(
                withdrawal_id = %id,
                transaction_id = %transaction_id,
                %err,
                "OPERATOR ACTION REQUIRED: transfer broadcast succeeded but completion write failed"
            );
            return Err(PayoutError::Persistence(format!(
                "completion write failed after broadcast of {}: {}",
                transaction_id, err
            )));
        }

        // Best-effort: the withdrawal is completed regardless of
        // whether the intent record could be linked.
        match self
            .store
            .link_latest_intent(record.user_id, &transaction_id)
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                warn!(
                    withdrawal_id = %id,
                    user_id = %record.user_id,
                    "No unlinked transaction intent found for user"
                );
            }
            Err(err) => {
                error!(
                    withdrawal_id = %id,
                    transaction_id = %transaction_id,
                    %err,
                    "Withdrawal completed but intent record link failed"
                );
            }
        }

        info!(
            withdrawal_id = %id,
            transaction_id = %transaction_id,
            "Withdrawal completed"
        );

        Ok(PayoutReceipt {
            explorer_url: self.explorer_url.replace("{tx}", &transaction_id),
            transaction_id,
        })
    }

    /// Compensating action for retryable pre-broadcast failures:
    /// processing -> pending. Its own failure is logged and swallowed
    /// so it never masks the original error.
    async fn release_to_pending(&self, id: Uuid, original: &PayoutError) {
        if let Err(err) = self.store.release_claim(id).await {
            error!(
                withdrawal_id = %id,
                %err,
                original = %original,
                "Failed to release claim after retryable failure"
            );
        }
    }

    /// Compensating action for terminal failures: best-effort
    /// transition to `failed`, logged on its own failure.
    async fn try_mark_failed(&self, id: Uuid, original: &PayoutError) {
        if let Err(err) = self.store.mark_failed(id).await {
            error!(
                withdrawal_id = %id,
                %err,
                original = %original,
                "Failed to mark withdrawal failed"
            );
        }
    }
}
