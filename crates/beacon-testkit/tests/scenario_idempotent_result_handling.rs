//! Idempotent result handling: redelivering the same `TaskResult`
//! two or more times must yield the same final Task state and exactly one
//! derived `check.ok`/`check.failed` event emission.

use std::sync::Arc;

use beacon_db::{CheckStore, TaskStore};
use beacon_reconciler::{reconcile_result, DerivedEvent, RecordingEventSink};
use beacon_schemas::{TaskResult, TaskResultStatus, TaskStatus};
use beacon_testkit::fixtures;
use chrono::Utc;

#[tokio::test]
async fn redelivered_failed_result_applies_once_and_emits_one_event() {
    let Some(pool) = fixtures::test_pool().await else {
        return;
    };

    let check_store = Arc::new(CheckStore::new(pool.clone()));
    let task_store = Arc::new(TaskStore::new(pool));

    let check = check_store
        .create_check("acme", fixtures::http_check("idempotent-target", 60))
        .await
        .unwrap();
    let task = task_store
        .insert_task(check.id, &check.tenant_id, Utc::now(), check.task_priority())
        .await
        .unwrap();

    let result = TaskResult {
        task_id: task.task_id,
        check_id: check.id,
        status: TaskResultStatus::Failed,
        error_message: Some("connection refused".into()),
        duration_ms: 1234,
        completed_at: Utc::now(),
    };

    let sink = RecordingEventSink::new();

    reconcile_result(&task_store, &sink, &result).await.unwrap();
    reconcile_result(&task_store, &sink, &result).await.unwrap();
    reconcile_result(&task_store, &sink, &result).await.unwrap();

    let final_task = task_store.get_task(task.task_id).await.unwrap();
    assert_eq!(final_task.status, TaskStatus::Failed);

    let events = sink.events();
    assert_eq!(events.len(), 1, "exactly one derived event despite redelivery");
    match &events[0] {
        DerivedEvent::CheckFailed {
            check_id,
            task_id,
            error_message,
        } => {
            assert_eq!(*check_id, check.id);
            assert_eq!(*task_id, task.task_id);
            assert_eq!(error_message.as_deref(), Some("connection refused"));
        }
        other => panic!("expected CheckFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn out_of_order_results_for_different_tasks_each_apply_independently() {
    let Some(pool) = fixtures::test_pool().await else {
        return;
    };

    let check_store = Arc::new(CheckStore::new(pool.clone()));
    let task_store = Arc::new(TaskStore::new(pool));

    let check = check_store
        .create_check("acme", fixtures::http_check("out-of-order-target", 60))
        .await
        .unwrap();
    let task_a = task_store
        .insert_task(check.id, &check.tenant_id, Utc::now(), check.task_priority())
        .await
        .unwrap();
    let task_b = task_store
        .insert_task(check.id, &check.tenant_id, Utc::now(), check.task_priority())
        .await
        .unwrap();

    let sink = RecordingEventSink::new();

    // task_b's result arrives before task_a's, simulating broker reordering.
    let result_b = TaskResult {
        task_id: task_b.task_id,
        check_id: check.id,
        status: TaskResultStatus::Completed,
        error_message: None,
        duration_ms: 50,
        completed_at: Utc::now(),
    };
    let result_a = TaskResult {
        task_id: task_a.task_id,
        check_id: check.id,
        status: TaskResultStatus::Failed,
        error_message: Some("timeout".into()),
        duration_ms: 5000,
        completed_at: Utc::now(),
    };

    reconcile_result(&task_store, &sink, &result_b).await.unwrap();
    reconcile_result(&task_store, &sink, &result_a).await.unwrap();

    assert_eq!(task_store.get_task(task_a.task_id).await.unwrap().status, TaskStatus::Failed);
    assert_eq!(
        task_store.get_task(task_b.task_id).await.unwrap().status,
        TaskStatus::Completed
    );
    assert_eq!(sink.events().len(), 2);
}
