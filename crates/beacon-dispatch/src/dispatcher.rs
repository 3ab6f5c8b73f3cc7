//! Dispatcher: turns one "check is due" signal into a durable Task
//! plus a published broker message, exactly once per due tick per check.

use std::sync::Arc;
use std::time::Duration;

use beacon_db::{CheckStore, ScheduleStore, TaskStore};
use beacon_index::ScheduleIndex;
use beacon_lease::{AcquireOutcome, LeaseManager};
use beacon_publisher::{TaskEnvelope, TaskPublisher};
use beacon_schemas::{SchedulerResult, TaskStatus};
use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

pub struct Dispatcher {
    pub owner_id: String,
    pub check_store: Arc<CheckStore>,
    pub schedule_store: Arc<ScheduleStore>,
    pub task_store: Arc<TaskStore>,
    pub lease_manager: Arc<dyn LeaseManager>,
    pub publisher: Arc<dyn TaskPublisher>,
    pub index: Arc<ScheduleIndex>,
    pub lease_ttl: Duration,
}

/// Outcome of one dispatch attempt, mainly useful to tests asserting the
/// at-most-one-concurrent-dispatch property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched,
    Skipped,
    Busy,
    Failed,
}

impl Dispatcher {
    /// Run the per-check dispatch algorithm for a check the Tick Loop found
    /// due. Never returns `Err`: every failure mode is logged and reflected
    /// in the returned outcome, since a single check's failure must never
    /// abort the tick for others.
    pub async fn dispatch_one(&self, check_id: Uuid) -> DispatchOutcome {
        self.run(check_id, false).await
    }

    /// Manual fire (Admin API `ExecuteTask`): bypasses the due-time gate so
    /// an operator can force a check to run right now, but still goes
    /// through the lease/publish/reschedule steps so the lease discipline
    /// and next-run bookkeeping hold exactly as they do for a tick-driven
    /// dispatch.
    pub async fn dispatch_manual(&self, check_id: Uuid) -> DispatchOutcome {
        self.run(check_id, true).await
    }

    async fn run(&self, check_id: Uuid, force: bool) -> DispatchOutcome {
        match self.try_dispatch(check_id, force).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(check_id = %check_id, error = %e, "dispatch attempt errored, will retry next tick");
                DispatchOutcome::Failed
            }
        }
    }

    async fn try_dispatch(&self, check_id: Uuid, force: bool) -> SchedulerResult<DispatchOutcome> {
        // Step 1: re-read the Check; the index's ordering can be stale under
        // concurrent Admin API edits.
        let check = match self.check_store.get_check(check_id).await {
            Ok(c) => c,
            Err(_) => {
                self.index.remove(check_id).await;
                return Ok(DispatchOutcome::Skipped);
            }
        };
        let now = Utc::now();
        let due = force || check.next_run_at.map_or(false, |t| t <= now);
        if !check.enabled || !due {
            return Ok(DispatchOutcome::Skipped);
        }

        // Step 2: acquire the lease. Busy means another replica won this tick.
        let lease = match self
            .lease_manager
            .try_acquire(check_id, &self.owner_id, self.lease_ttl)
            .await?
        {
            AcquireOutcome::Acquired(lease) => lease,
            AcquireOutcome::Busy => return Ok(DispatchOutcome::Busy),
        };

        let priority = check.task_priority();

        // Step 3: persist the Task before publishing (outbox durability
        // boundary).
        let task = self
            .task_store
            .insert_task(check.id, &check.tenant_id, now, priority)
            .await?;

        let envelope = TaskEnvelope {
            task_id: task.task_id,
            check_id: check.id,
            tenant_id: check.tenant_id.clone(),
            r#type: check.r#type.as_str().to_string(),
            target: check.target.clone(),
            config: check.config.clone().into(),
            timeout_seconds: check.timeout_seconds,
            scheduled_at: now,
            priority,
        };

        // Step 4: publish with confirms + retry (handled inside the publisher).
        if let Err(e) = self.publisher.publish(&envelope).await {
            warn!(check_id = %check_id, task_id = %task.task_id, error = %e, "publish exhausted retries");
            self.task_store
                .set_status_if_not_terminal(task.task_id, TaskStatus::Failed)
                .await?;
            // The check must remain schedulable even though this attempt
            // never reached the broker; recompute next_run_at the same way
            // a successful dispatch would.
            self.reschedule(&check, now).await?;
            let _ = self.lease_manager.release(check_id, &self.owner_id).await;
            return Ok(DispatchOutcome::Failed);
        }

        info!(check_id = %check_id, task_id = %task.task_id, "dispatched task");

        // Step 5: advance the schedule only after a confirmed publish, so the
        // Tick Loop cannot see this check as due again until now.
        self.reschedule(&check, now).await?;

        // Step 6: release the lease. A failed release is harmless — the
        // lease still expires at TTL and the Task row is authoritative.
        match self.lease_manager.release(check_id, &self.owner_id).await {
            Ok(_) => {}
            Err(e) => warn!(check_id = %check_id, error = %e, "lease release failed, will expire at TTL"),
        }

        let _ = lease;
        Ok(DispatchOutcome::Dispatched)
    }

    async fn reschedule(&self, check: &beacon_schemas::Check, now: chrono::DateTime<Utc>) -> SchedulerResult<()> {
        let schedule = self
            .schedule_store
            .get_schedule_by_check(check.id)
            .await
            .ok()
            .flatten();
        let next_run_at = beacon_db::next_due(check, schedule.as_ref(), now)?;

        self.check_store.set_last_run(check.id, now).await?;
        self.check_store.set_next_run(check.id, Some(next_run_at)).await?;
        self.index.upsert(check.id, next_run_at, check.task_priority()).await;
        Ok(())
    }
}
