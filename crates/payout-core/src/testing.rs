//! In-memory collaborator fakes for exercising the orchestration flow
//! without Postgres or a live ledger network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{GatewayError, StoreError};
use crate::traits::{NetworkGateway, RecordStore};
use crate::types::{
    LedgerEntry, LedgerEntryKind, SubmitOutcome, TransferPayload, WithdrawalRequest,
    WithdrawalStatus,
};

/// A transaction-intent row awaiting its transaction identifier.
#[derive(Clone, Debug)]
pub struct IntentRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
struct MemoryState {
    withdrawals: HashMap<Uuid, WithdrawalRequest>,
    entries: Vec<LedgerEntry>,
    intents: Vec<IntentRecord>,
}

/// `RecordStore` over process memory. Claims are atomic under one
/// mutex, giving the same exactly-one-winner semantics the SQL
/// conditional update provides.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    /// When set, the next `complete` call fails once.
    fail_next_complete: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_withdrawal(&self, record: WithdrawalRequest) {
        self.state
            .lock()
            .unwrap()
            .withdrawals
            .insert(record.id, record);
    }

    pub fn push_entry(&self, kind: LedgerEntryKind, amount: i64) {
        self.state
            .lock()
            .unwrap()
            .entries
            .push(LedgerEntry { kind, amount });
    }

    pub fn push_intent(&self, intent: IntentRecord) {
        self.state.lock().unwrap().intents.push(intent);
    }

    pub fn fail_next_complete(&self) {
        *self.fail_next_complete.lock().unwrap() = true;
    }

    pub fn withdrawal(&self, id: Uuid) -> Option<WithdrawalRequest> {
        self.state.lock().unwrap().withdrawals.get(&id).cloned()
    }

    pub fn intents(&self) -> Vec<IntentRecord> {
        self.state.lock().unwrap().intents.clone()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError> {
        Ok(self.state.lock().unwrap().withdrawals.get(&id).cloned())
    }

    async fn claim_pending(&self, id: Uuid) -> Result<Option<WithdrawalRequest>, StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.withdrawals.get_mut(&id) {
            Some(record) if record.status == WithdrawalStatus::Pending => {
                record.status = WithdrawalStatus::Processing;
                Ok(Some(record.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn release_claim(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.withdrawals.get_mut(&id) {
            Some(record) if record.status == WithdrawalStatus::Processing => {
                record.status = WithdrawalStatus::Pending;
                Ok(())
            }
            _ => Err(StoreError::ConditionFailed),
        }
    }

    async fn mark_failed(&self, id: Uuid) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        match state.withdrawals.get_mut(&id) {
            Some(record) if !record.status.is_terminal() => {
                record.status = WithdrawalStatus::Failed;
                Ok(())
            }
            _ => Err(StoreError::ConditionFailed),
        }
    }

    async fn complete(
        &self,
        id: Uuid,
        transaction_id: &str,
        completed_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        {
            let mut fail = self.fail_next_complete.lock().unwrap();
            if *fail {
                *fail = false;
                return Err(StoreError::Query("injected completion failure".into()));
            }
        }
        let mut state = self.state.lock().unwrap();
        match state.withdrawals.get_mut(&id) {
            Some(record) if record.status == WithdrawalStatus::Processing => {
                record.status = WithdrawalStatus::Completed;
                record.transaction_id = Some(transaction_id.to_string());
                record.completed_at = Some(completed_at);
                Ok(())
            }
            _ => Err(StoreError::ConditionFailed),
        }
    }

    async fn accrual_total(&self) -> Result<i64, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .entries
            .iter()
            .filter(|e| e.kind == LedgerEntryKind::Accrual)
            .map(|e| e.amount)
            .sum())
    }

    async fn completed_payout_total(&self) -> Result<i64, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .withdrawals
            .values()
            .filter(|w| w.status == WithdrawalStatus::Completed)
            .map(|w| w.amount)
            .sum())
    }

    async fn link_latest_intent(
        &self,
        user_id: Uuid,
        transaction_id: &str,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        let latest = state
            .intents
            .iter_mut()
            .filter(|i| i.user_id == user_id && i.transaction_id.is_none())
            .max_by_key(|i| i.created_at);
        match latest {
            Some(intent) => {
                intent.transaction_id = Some(transaction_id.to_string());
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// How the scripted gateway answers `submit`.
#[derive(Clone, Debug)]
pub enum SubmitScript {
    Accept,
    Reject(String),
    TransportError(String),
}

/// `NetworkGateway` fake with a programmable submit outcome and a
/// counter of broadcast attempts.
pub struct ScriptedGateway {
    window: AtomicU64,
    script: Mutex<SubmitScript>,
    submissions: AtomicUsize,
    submitted_ids: Mutex<Vec<String>>,
}

impl ScriptedGateway {
    pub fn accepting(window: u64) -> Self {
        Self {
            window: AtomicU64::new(window),
            script: Mutex::new(SubmitScript::Accept),
            submissions: AtomicUsize::new(0),
            submitted_ids: Mutex::new(Vec::new()),
        }
    }

    pub fn set_script(&self, script: SubmitScript) {
        *self.script.lock().unwrap() = script;
    }

    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn submitted_ids(&self) -> Vec<String> {
        self.submitted_ids.lock().unwrap().clone()
    }
}

#[async_trait]
impl NetworkGateway for ScriptedGateway {
    async fn current_window(&self) -> Result<u64, GatewayError> {
        Ok(self.window.fetch_add(1, Ordering::SeqCst))
    }

    async fn submit(&self, payload: &TransferPayload) -> Result<SubmitOutcome, GatewayError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        self.submitted_ids
            .lock()
            .unwrap()
            .push(payload.transaction_id.clone());
        match self.script.lock().unwrap().clone() {
            SubmitScript::Accept => Ok(SubmitOutcome {
                accepted: true,
                transaction_id: Some(payload.transaction_id.clone()),
                error: None,
            }),
            SubmitScript::Reject(detail) => Ok(SubmitOutcome {
                accepted: false,
                transaction_id: None,
                error: Some(detail),
            }),
            SubmitScript::TransportError(detail) => Err(GatewayError::Transport(detail)),
        }
    }
}

/// Convenience constructor for a pending withdrawal record.
pub fn pending_withdrawal(user_id: Uuid, amount: i64) -> WithdrawalRequest {
    WithdrawalRequest {
        id: Uuid::new_v4(),
        user_id,
        destination: "G-dest-address".to_string(),
        amount,
        status: WithdrawalStatus::Pending,
        transaction_id: None,
        completed_at: None,
    }
}
