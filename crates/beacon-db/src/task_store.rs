//! Durable Task and TaskResult persistence.
//!
//! The Task row IS the durability boundary the outbox pattern buys: the
//! Dispatcher writes it before publishing, and `task_claim_batch`
//! lets a crash-recovery sweep re-claim rows that were persisted but never
//! confirmed-published, using the same `FOR UPDATE SKIP LOCKED` discipline
//! the corpus uses for its own outbox claim.

use beacon_schemas::{Task, TaskResult, TaskResultStatus, TaskStatus};
use beacon_schemas::{SchedulerError, SchedulerResult};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone)]
pub struct TaskStore {
    pool: PgPool,
}

impl TaskStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert_task(
        &self,
        check_id: Uuid,
        tenant_id: &str,
        scheduled_at: DateTime<Utc>,
        priority: i32,
    ) -> SchedulerResult<Task> {
        let task_id = Uuid::new_v4();
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO tasks (id, check_id, tenant_id, scheduled_time, priority, status, created_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            RETURNING *
            "#,
        )
        .bind(task_id)
        .bind(check_id)
        .bind(tenant_id)
        .bind(scheduled_at)
        .bind(priority)
        .bind(TaskStatus::Pending.as_str())
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        row_to_task(row)
    }

    pub async fn get_task(&self, task_id: Uuid) -> SchedulerResult<Task> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| SchedulerError::not_found(format!("task {task_id} not found")))?;
        row_to_task(row)
    }

    pub async fn get_task_result(&self, task_id: Uuid) -> SchedulerResult<Option<TaskResult>> {
        let row = sqlx::query("SELECT * FROM task_results WHERE task_id = $1")
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        row.map(row_to_task_result).transpose()
    }

    /// Transition a Task's status, but only if it is not already terminal —
    /// terminal states never transition. Returns `true` if this call
    /// actually performed the transition.
    pub async fn set_status_if_not_terminal(
        &self,
        task_id: Uuid,
        status: TaskStatus,
    ) -> SchedulerResult<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET status = $2
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(task_id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(map_db_err)?;

        Ok(result.rows_affected() > 0)
    }

    /// Idempotent result application: inserts `task_results` only once per
    /// task (`ON CONFLICT DO NOTHING`), and only flips the Task to the
    /// result's terminal status if it was not already terminal. Returns
    /// `true` exactly the first time a given `task_id` is reconciled, which
    /// is what gates the single derived-event emission.
    pub async fn apply_result(&self, result: &TaskResult) -> SchedulerResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO task_results (task_id, check_id, status, error_message, duration_ms, completed_at)
            VALUES ($1,$2,$3,$4,$5,$6)
            ON CONFLICT (task_id) DO NOTHING
            "#,
        )
        .bind(result.task_id)
        .bind(result.check_id)
        .bind(result.status.as_str())
        .bind(&result.error_message)
        .bind(result.duration_ms)
        .bind(result.completed_at)
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?
        .rows_affected()
            > 0;

        if inserted {
            let task_status = match result.status {
                TaskResultStatus::Completed => TaskStatus::Completed,
                TaskResultStatus::Failed => TaskStatus::Failed,
            };
            sqlx::query(
                "UPDATE tasks SET status = $2
                 WHERE id = $1 AND status NOT IN ('completed', 'failed')",
            )
            .bind(result.task_id)
            .bind(task_status.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(inserted)
    }

    /// Tasks still `pending` older than `older_than` — candidates for the
    /// Reconciler's orphan sweeper.
    pub async fn find_orphan_tasks(&self, older_than: DateTime<Utc>) -> SchedulerResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE status = 'pending' AND created_at < $1",
        )
        .bind(older_than)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(row_to_task).collect()
    }

    /// Transition an orphaned Task to `failed` and persist a `task_results`
    /// row recording why, the same way a worker-reported failure would, so
    /// the reason survives and a later genuine result for this task is
    /// correctly treated as an already-terminal duplicate.
    pub async fn mark_failed(
        &self,
        task_id: Uuid,
        check_id: Uuid,
        error_message: &str,
    ) -> SchedulerResult<bool> {
        let mut tx = self.pool.begin().await.map_err(map_db_err)?;

        let transitioned = sqlx::query(
            "UPDATE tasks SET status = $2
             WHERE id = $1 AND status NOT IN ('completed', 'failed')",
        )
        .bind(task_id)
        .bind(TaskStatus::Failed.as_str())
        .execute(&mut *tx)
        .await
        .map_err(map_db_err)?
        .rows_affected()
            > 0;

        if transitioned {
            sqlx::query(
                r#"
                INSERT INTO task_results (task_id, check_id, status, error_message, duration_ms, completed_at)
                VALUES ($1,$2,$3,$4,$5,$6)
                ON CONFLICT (task_id) DO NOTHING
                "#,
            )
            .bind(task_id)
            .bind(check_id)
            .bind(TaskResultStatus::Failed.as_str())
            .bind(error_message)
            .bind(0_i64)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .map_err(map_db_err)?;
        }

        tx.commit().await.map_err(map_db_err)?;
        Ok(transitioned)
    }
}

/// Gated so only `beacon-runtime`'s crash-recovery sweep can claim rows out
/// from under the Dispatcher's own write path, mirroring the corpus's
/// `runtime-claim` feature gate on `outbox_claim_batch`.
#[cfg(feature = "runtime-claim")]
pub async fn task_claim_batch(
    pool: &PgPool,
    limit: i64,
) -> SchedulerResult<Vec<Task>> {
    let rows = sqlx::query(
        r#"
        WITH to_claim AS (
            SELECT id FROM tasks
            WHERE status = 'pending'
            ORDER BY created_at ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
        )
        SELECT t.* FROM tasks t JOIN to_claim c ON c.id = t.id
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
    .map_err(map_db_err)?;

    rows.into_iter().map(row_to_task).collect()
}

fn row_to_task(row: PgRow) -> SchedulerResult<Task> {
    let status_str: String = row.try_get("status").map_err(map_db_err)?;
    let status = TaskStatus::from_str(&status_str).map_err(SchedulerError::internal)?;

    Ok(Task {
        task_id: row.try_get("id").map_err(map_db_err)?,
        check_id: row.try_get("check_id").map_err(map_db_err)?,
        tenant_id: row.try_get("tenant_id").map_err(map_db_err)?,
        scheduled_at: row.try_get("scheduled_time").map_err(map_db_err)?,
        priority: row.try_get("priority").map_err(map_db_err)?,
        status,
        created_at: row.try_get("created_at").map_err(map_db_err)?,
    })
}

fn row_to_task_result(row: PgRow) -> SchedulerResult<TaskResult> {
    let status_str: String = row.try_get("status").map_err(map_db_err)?;
    let status = TaskResultStatus::from_str(&status_str).map_err(SchedulerError::internal)?;

    Ok(TaskResult {
        task_id: row.try_get("task_id").map_err(map_db_err)?,
        check_id: row.try_get("check_id").map_err(map_db_err)?,
        status,
        error_message: row.try_get("error_message").map_err(map_db_err)?,
        duration_ms: row.try_get("duration_ms").map_err(map_db_err)?,
        completed_at: row.try_get("completed_at").map_err(map_db_err)?,
    })
}

fn map_db_err(e: sqlx::Error) -> SchedulerError {
    SchedulerError::Internal(format!("storage error: {e}"))
}
