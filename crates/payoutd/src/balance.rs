use std::sync::Arc;

use payout_core::RecordStore;
use tracing::debug;

use crate::error::Result;

/// Derives the currently available treasury balance from historical
/// ledger entries and completed payouts.
///
/// available = accrued revenue x share ratio - completed withdrawals.
/// Computed fresh per request; concurrent completions change it.
pub struct BalanceCalculator {
    store: Arc<dyn RecordStore>,
    share_bps: u16,
}

impl BalanceCalculator {
    pub fn new(store: Arc<dyn RecordStore>, share_bps: u16) -> Self {
        Self { store, share_bps }
    }

    pub async fn available(&self) -> Result<i64> {
        let accrued = self.store.accrual_total().await?;
        let paid_out = self.store.completed_payout_total().await?;

        let distributable = apply_share(accrued, self.share_bps);
        let available = distributable - paid_out;

        debug!(accrued, distributable, paid_out, available, "Computed balance");
        Ok(available)
    }
}

fn apply_share(total: i64, bps: u16) -> i64 {
    (total as i128 * bps as i128 / 10_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use payout_core::testing::MemoryStore;
    use payout_core::LedgerEntryKind;

    #[test]
    fn share_application() {
        // 55% of 1,000,000
        assert_eq!(apply_share(1_000_000, 5500), 550_000);
        assert_eq!(apply_share(0, 5500), 0);
        // widened math survives large totals
        assert_eq!(apply_share(i64::MAX / 2, 10_000), i64::MAX / 2);
    }

    #[tokio::test]
    async fn empty_aggregates_yield_zero() {
        let store = Arc::new(MemoryStore::new());
        let calc = BalanceCalculator::new(store, 5500);
        assert_eq!(calc.available().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn completed_payouts_reduce_balance() {
        let store = Arc::new(MemoryStore::new());
        store.push_entry(LedgerEntryKind::Accrual, 2_000_000);
        // non-accrual entries are ignored by the formula
        store.push_entry(LedgerEntryKind::Withdrawal, 900_000);

        let mut done = payout_core::testing::pending_withdrawal(uuid::Uuid::new_v4(), 100_000);
        done.status = payout_core::WithdrawalStatus::Completed;
        done.transaction_id = Some("tx".into());
        store.insert_withdrawal(done);

        let calc = BalanceCalculator::new(store, 5500);
        // 2,000,000 * 0.55 - 100,000
        assert_eq!(calc.available().await.unwrap(), 1_000_000);
    }
}
