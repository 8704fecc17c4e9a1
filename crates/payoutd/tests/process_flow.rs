//! End-to-end orchestration tests over in-memory collaborators:
//! idempotency, balance gating, retryable failures, and the
//! concurrent-claim race.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use payout_core::testing::{
    pending_withdrawal, IntentRecord, MemoryStore, ScriptedGateway, SubmitScript,
};
use payout_core::{Ed25519TransferBuilder, LedgerEntryKind, RecordStore, WithdrawalStatus};
use payoutd::error::PayoutError;
use payoutd::orchestrator::PayoutOrchestrator;

const SHARE_BPS: u16 = 5500;
const WINDOW_OFFSET: u64 = 30;

fn orchestrator(
    store: Arc<MemoryStore>,
    gateway: Arc<ScriptedGateway>,
) -> PayoutOrchestrator {
    PayoutOrchestrator::new(
        store,
        gateway,
        Arc::new(Ed25519TransferBuilder::from_seed([9u8; 32])),
        SHARE_BPS,
        WINDOW_OFFSET,
        "https://scan.test/tx/{tx}".to_string(),
    )
}

/// Store with 1,000,000 available: 2,000,000 accrued x 0.55 minus a
/// 100,000 completed payout.
fn funded_store() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.push_entry(LedgerEntryKind::Accrual, 2_000_000);
    let mut prior = pending_withdrawal(Uuid::new_v4(), 100_000);
    prior.status = WithdrawalStatus::Completed;
    prior.transaction_id = Some("prior-tx".into());
    store.insert_withdrawal(prior);
    store
}

#[tokio::test]
async fn sufficient_balance_completes_withdrawal() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));
    let user_id = Uuid::new_v4();

    let record = pending_withdrawal(user_id, 500_000);
    let id = record.id;
    store.insert_withdrawal(record);
    store.push_intent(IntentRecord {
        id: Uuid::new_v4(),
        user_id,
        transaction_id: None,
        created_at: Utc::now(),
    });

    let orch = orchestrator(store.clone(), gateway.clone());
    let receipt = orch.process(id).await.unwrap();

    assert!(!receipt.transaction_id.is_empty());
    assert_eq!(
        receipt.explorer_url,
        format!("https://scan.test/tx/{}", receipt.transaction_id)
    );
    assert_eq!(gateway.submissions(), 1);
    assert_eq!(gateway.submitted_ids(), vec![receipt.transaction_id.clone()]);

    let stored = store.withdrawal(id).unwrap();
    assert_eq!(stored.status, WithdrawalStatus::Completed);
    assert_eq!(stored.transaction_id.as_deref(), Some(receipt.transaction_id.as_str()));
    assert!(stored.completed_at.is_some());

    // The user's intent record picked up the identifier.
    let intents = store.intents();
    assert_eq!(
        intents[0].transaction_id.as_deref(),
        Some(receipt.transaction_id.as_str())
    );
}

#[tokio::test]
async fn insufficient_balance_fails_without_submission() {
    let store = Arc::new(MemoryStore::new());
    store.push_entry(LedgerEntryKind::Accrual, 182); // x 0.55 -> 100 available
    let gateway = Arc::new(ScriptedGateway::accepting(1000));

    let record = pending_withdrawal(Uuid::new_v4(), 500_000);
    let id = record.id;
    store.insert_withdrawal(record);

    let orch = orchestrator(store.clone(), gateway.clone());
    let err = orch.process(id).await.unwrap_err();

    match err {
        PayoutError::InsufficientBalance {
            available,
            requested,
        } => {
            assert_eq!(available, 100);
            assert_eq!(requested, 500_000);
        }
        other => panic!("expected InsufficientBalance, got {other}"),
    }
    assert_eq!(gateway.submissions(), 0);
    assert_eq!(
        store.withdrawal(id).unwrap().status,
        WithdrawalStatus::Failed
    );
}

#[tokio::test]
async fn unknown_id_is_not_found_and_mutates_nothing() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));
    let orch = orchestrator(store.clone(), gateway.clone());

    let err = orch.process(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, PayoutError::NotFound));
    assert_eq!(gateway.submissions(), 0);
}

#[tokio::test]
async fn terminal_record_is_never_reprocessed() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));

    let mut record = pending_withdrawal(Uuid::new_v4(), 10_000);
    record.status = WithdrawalStatus::Completed;
    record.transaction_id = Some("settled-tx".into());
    let id = record.id;
    store.insert_withdrawal(record);

    let orch = orchestrator(store.clone(), gateway.clone());
    let err = orch.process(id).await.unwrap_err();

    assert!(matches!(
        err,
        PayoutError::AlreadyProcessed(WithdrawalStatus::Completed)
    ));
    assert_eq!(gateway.submissions(), 0);

    let stored = store.withdrawal(id).unwrap();
    assert_eq!(stored.status, WithdrawalStatus::Completed);
    assert_eq!(stored.transaction_id.as_deref(), Some("settled-tx"));
}

#[tokio::test]
async fn second_call_is_idempotent() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));

    let record = pending_withdrawal(Uuid::new_v4(), 500_000);
    let id = record.id;
    store.insert_withdrawal(record);

    let orch = orchestrator(store.clone(), gateway.clone());
    orch.process(id).await.unwrap();

    let err = orch.process(id).await.unwrap_err();
    assert!(matches!(
        err,
        PayoutError::AlreadyProcessed(WithdrawalStatus::Completed)
    ));
    assert_eq!(gateway.submissions(), 1);
}

#[tokio::test]
async fn rejected_submission_leaves_record_pending_and_retryable() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));
    gateway.set_script(SubmitScript::Reject("window expired".into()));

    let record = pending_withdrawal(Uuid::new_v4(), 500_000);
    let id = record.id;
    store.insert_withdrawal(record);

    let orch = orchestrator(store.clone(), gateway.clone());
    let err = orch.process(id).await.unwrap_err();

    match err {
        PayoutError::BroadcastFailed(detail) => assert_eq!(detail, "window expired"),
        other => panic!("expected BroadcastFailed, got {other}"),
    }
    assert_eq!(
        store.withdrawal(id).unwrap().status,
        WithdrawalStatus::Pending
    );
    // Nothing completed, so the balance is unchanged.
    assert_eq!(store.completed_payout_total().await.unwrap(), 100_000);

    // Re-invoking the same id after the network recovers succeeds.
    gateway.set_script(SubmitScript::Accept);
    let receipt = orch.process(id).await.unwrap();
    assert!(!receipt.transaction_id.is_empty());
    assert_eq!(gateway.submissions(), 2);
    assert_eq!(
        store.withdrawal(id).unwrap().status,
        WithdrawalStatus::Completed
    );
}

#[tokio::test]
async fn transport_error_leaves_record_pending() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));
    gateway.set_script(SubmitScript::TransportError("connection reset".into()));

    let record = pending_withdrawal(Uuid::new_v4(), 500_000);
    let id = record.id;
    store.insert_withdrawal(record);

    let orch = orchestrator(store.clone(), gateway.clone());
    let err = orch.process(id).await.unwrap_err();

    assert!(matches!(err, PayoutError::BroadcastFailed(_)));
    assert_eq!(
        store.withdrawal(id).unwrap().status,
        WithdrawalStatus::Pending
    );
}

#[tokio::test]
async fn build_failure_leaves_record_pending_without_submission() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));

    let mut record = pending_withdrawal(Uuid::new_v4(), 500_000);
    record.destination = String::new(); // builder rejects this
    let id = record.id;
    store.insert_withdrawal(record);

    let orch = orchestrator(store.clone(), gateway.clone());
    let err = orch.process(id).await.unwrap_err();

    assert!(matches!(err, PayoutError::TransferBuildFailed(_)));
    assert_eq!(gateway.submissions(), 0);
    assert_eq!(
        store.withdrawal(id).unwrap().status,
        WithdrawalStatus::Pending
    );
}

#[tokio::test]
async fn completion_write_failure_surfaces_persistence_error() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));

    let record = pending_withdrawal(Uuid::new_v4(), 500_000);
    let id = record.id;
    store.insert_withdrawal(record);
    store.fail_next_complete();

    let orch = orchestrator(store.clone(), gateway.clone());
    let err = orch.process(id).await.unwrap_err();

    // Funds moved; the record is deliberately not rolled back to
    // pending or failed.
    assert!(matches!(err, PayoutError::Persistence(_)));
    assert_eq!(gateway.submissions(), 1);
    assert_eq!(
        store.withdrawal(id).unwrap().status,
        WithdrawalStatus::Processing
    );
}

#[tokio::test]
async fn concurrent_invocations_submit_at_most_once() {
    let store = funded_store();
    let gateway = Arc::new(ScriptedGateway::accepting(1000));

    let record = pending_withdrawal(Uuid::new_v4(), 500_000);
    let id = record.id;
    store.insert_withdrawal(record);

    let orch = Arc::new(orchestrator(store.clone(), gateway.clone()));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let orch = orch.clone();
        handles.push(tokio::spawn(async move { orch.process(id).await }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(receipt) => {
                successes += 1;
                assert!(!receipt.transaction_id.is_empty());
            }
            Err(PayoutError::AlreadyProcessed(_)) => {}
            Err(other) => panic!("unexpected error under contention: {other}"),
        }
    }

    assert_eq!(successes, 1);
    assert_eq!(gateway.submissions(), 1);
    assert_eq!(
        store.withdrawal(id).unwrap().status,
        WithdrawalStatus::Completed
    );
}
