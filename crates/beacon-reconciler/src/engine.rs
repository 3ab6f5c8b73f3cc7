//! Core reconcile logic: apply an incoming `TaskResult` idempotently and
//! emit exactly one derived event; periodically reap orphaned Tasks.

use std::sync::Arc;
use std::time::Duration;

use beacon_db::{CheckStore, ScheduleStore, TaskStore};
use beacon_index::ScheduleIndex;
use beacon_schemas::{SchedulerResult, TaskResult, TaskResultStatus};
use chrono::Utc;
use tracing::{info, warn};

use crate::types::{DerivedEvent, EventSink};

/// Apply one `TaskResult`. Ack-after-commit is the caller's responsibility
/// (the broker consumer only acks once this returns `Ok`); DB errors here
/// propagate so the message is nacked and redelivered.
pub async fn reconcile_result(
    task_store: &TaskStore,
    event_sink: &dyn EventSink,
    result: &TaskResult,
) -> SchedulerResult<()> {
    // Absent or already-terminal tasks: ack-and-drop semantics are handled
    // by apply_result returning `false` in the already-terminal case; a
    // genuinely absent task is treated the same way (idempotent drop) since
    // there is nothing meaningful to reconcile.
    let task_exists = task_store.get_task(result.task_id).await.is_ok();
    if !task_exists {
        warn!(task_id = %result.task_id, "result for unknown task, dropping");
        return Ok(());
    }

    let applied = task_store.apply_result(result).await?;
    if !applied {
        info!(task_id = %result.task_id, "result already reconciled, dropping duplicate");
        return Ok(());
    }

    let event = match result.status {
        TaskResultStatus::Completed => DerivedEvent::CheckOk {
            check_id: result.check_id,
            task_id: result.task_id,
        },
        TaskResultStatus::Failed => DerivedEvent::CheckFailed {
            check_id: result.check_id,
            task_id: result.task_id,
            error_message: result.error_message.clone(),
        },
    };
    event_sink.emit(event);

    Ok(())
}

/// Scan for Tasks `pending` beyond `task_orphan_timeout`, transition them to
/// `failed`, and recompute `next_run_at` so the Check becomes schedulable
/// again. Returns the number reaped.
pub async fn sweep_orphans(
    task_store: &TaskStore,
    check_store: &CheckStore,
    schedule_store: &ScheduleStore,
    index: &ScheduleIndex,
    task_orphan_timeout: Duration,
) -> SchedulerResult<usize> {
    let now = Utc::now();
    let cutoff = now - chrono::Duration::from_std(task_orphan_timeout).unwrap_or_default();

    let orphans = task_store.find_orphan_tasks(cutoff).await?;
    let mut reaped = 0;

    for task in orphans {
        let transitioned = task_store.mark_failed(task.task_id, task.check_id, "orphan").await?;
        if !transitioned {
            continue;
        }
        reaped += 1;
        warn!(task_id = %task.task_id, check_id = %task.check_id, "reaped orphan task");

        let Ok(check) = check_store.get_check(task.check_id).await else {
            continue;
        };
        if !check.enabled {
            continue;
        }

        let schedule = schedule_store.get_schedule_by_check(check.id).await.ok().flatten();
        if let Ok(next_run_at) = beacon_db::next_due(&check, schedule.as_ref(), now) {
            check_store.set_next_run(check.id, Some(next_run_at)).await?;
            index.upsert(check.id, next_run_at, check.task_priority()).await;
        }
    }

    Ok(reaped)
}

/// Background loop driving `sweep_orphans` on `interval`, stoppable via the
/// returned `Arc<tokio::sync::Notify>`.
pub async fn run_orphan_sweep_loop(
    task_store: Arc<TaskStore>,
    check_store: Arc<CheckStore>,
    schedule_store: Arc<ScheduleStore>,
    index: Arc<ScheduleIndex>,
    interval: Duration,
    task_orphan_timeout: Duration,
    stop: Arc<tokio::sync::Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match sweep_orphans(&task_store, &check_store, &schedule_store, &index, task_orphan_timeout).await {
                    Ok(n) if n > 0 => info!(reaped = n, "orphan sweep reaped tasks"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "orphan sweep failed"),
                }
            }
            _ = stop.notified() => {
                info!("orphan sweep loop stopping");
                return;
            }
        }
    }
}
