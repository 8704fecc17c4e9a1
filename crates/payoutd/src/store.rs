//! Postgres-backed record store. All status transitions are
//! conditional updates checked by affected-row count, so concurrent
//! callers race on the database row, not on process memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;
use uuid::Uuid;

use payout_core::{RecordStore, StoreError, WithdrawalRequest, WithdrawalStatus};

pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(std::time::Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Query(format!("Failed to connect to PostgreSQL: {}", e)))?;

        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn withdrawal_from_row(row: &sqlx::postgres::PgRow) -> Result<WithdrawalRequest, StoreError> {
    let status_raw: String = row.get("status");
    let status = WithdrawalStatus::parse(&status_raw)
        .ok_or_else(|| StoreError::Query(format!("Unknown withdrawal status: {}", status_raw)))?;

    Ok(WithdrawalRequest {
        id: row.get("id"),
        user_id: row.get("user_id"),
        destination: row.get("destination"),
        amount: row.get("amount"),
        status,
        transaction_id: row.get("transaction_id"),
        completed_at: row.get("completed_at"),
    })
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, destination, amount, status, transaction_id, completed_at
            FROM withdrawals
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to fetch withdrawal: {}", e)))?;

        row.as_ref().map(withdrawal_from_row).transpose()
    }

    async fn claim_pending(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError> {
        // The WHERE status = 'pending' clause is the idempotency gate:
        // exactly one concurrent caller gets the row back.
        let row = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'processing'
            WHERE id = $1 AND status = 'pending'
            RETURNING id, user_id, destination, amount, status, transaction_id, completed_at
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to claim withdrawal: {}", e)))?;

        if row.is_some() {
            debug!(withdrawal_id = %id, "Claimed pending withdrawal");
        }
        row.as_ref().map(withdrawal_from_row).transpose()
    }

    async fn release_claim(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'pending'
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to release claim: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConditionFailed);
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'failed'
            WHERE id = $1 AND status IN ('pending', 'processing')
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to mark withdrawal failed: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConditionFailed);
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        transaction_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE withdrawals
            SET status = 'completed', transaction_id = $2, completed_at = $3
            WHERE id = $1 AND status = 'processing'
            "#,
        )
        .bind(id)
        .bind(transaction_id)
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to complete withdrawal: {}", e)))?;

        if result.rows_affected() == 0 {
            return Err(StoreError::ConditionFailed);
        }
        Ok(())
    }

    async fn accrual_total(&self) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT AS total
            FROM ledger_entries
            WHERE entry_type = 'accrual'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to sum ledger entries: {}", e)))?;

        Ok(row.get("total"))
    }

    async fn completed_payout_total(&self) -> Result<i64, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT AS total
            FROM withdrawals
            WHERE status = 'completed'
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to sum completed payouts: {}", e)))?;

        Ok(row.get("total"))
    }

    async fn link_latest_intent(
        &self,
        user_id: Uuid,
        transaction_id: &str,
    ) -> Result<bool, StoreError> {
        // Most recently created intent without an identifier wins.
        let result = sqlx::query(
            r#"
            UPDATE transactions
            SET transaction_id = $2
            WHERE id = (
                SELECT id FROM transactions
                WHERE user_id = $1 AND transaction_id IS NULL
                ORDER BY created_at DESC
                LIMIT 1
            )
            "#,
        )
        .bind(user_id)
        .bind(transaction_id)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Query(format!("Failed to link transaction record: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
