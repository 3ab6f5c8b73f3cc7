//! Cron overrides attached to a Check. `Check ↔ Schedule` is 1:1 by
//! foreign key, never a cycle — kept as a separate table keyed by `check_id`.

use beacon_schemas::{NewSchedule, Schedule, SchedulerError, SchedulerResult};
use chrono::Utc;
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::validation::validate_cron_expression;

#[derive(Clone)]
pub struct ScheduleStore {
    pool: PgPool,
}

impl ScheduleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_schedule(&self, check_id: Uuid, def: NewSchedule) -> SchedulerResult<Schedule> {
        validate_cron_expression(&def.cron_expression)?;
        let now = Utc::now();

        let row = sqlx::query(
            r#"
            INSERT INTO schedules (check_id, cron_expression, timezone, is_active, created_at, updated_at)
            VALUES ($1,$2,$3,$4,$5,$5)
            ON CONFLICT (check_id) DO UPDATE SET
                cron_expression = EXCLUDED.cron_expression,
                timezone = EXCLUDED.timezone,
                is_active = EXCLUDED.is_active,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(check_id)
        .bind(&def.cron_expression)
        .bind(&def.timezone)
        .bind(def.is_active)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;

        row_to_schedule(row)
    }

    pub async fn update_schedule(&self, check_id: Uuid, def: NewSchedule) -> SchedulerResult<Schedule> {
        // Attaching a schedule always replaces any existing one (
        // ScheduleCheck "attaches/replaces cron").
        self.create_schedule(check_id, def).await
    }

    pub async fn delete_schedule_by_check(&self, check_id: Uuid) -> SchedulerResult<()> {
        sqlx::query("DELETE FROM schedules WHERE check_id = $1")
            .bind(check_id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    pub async fn get_schedule_by_check(&self, check_id: Uuid) -> SchedulerResult<Option<Schedule>> {
        let row = sqlx::query("SELECT * FROM schedules WHERE check_id = $1")
            .bind(check_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;

        row.map(row_to_schedule).transpose()
    }

    pub async fn list_schedules(&self, tenant_id: &str) -> SchedulerResult<Vec<Schedule>> {
        let rows = sqlx::query(
            "SELECT s.* FROM schedules s JOIN checks c ON c.id = s.check_id WHERE c.tenant_id = $1",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_err)?;

        rows.into_iter().map(row_to_schedule).collect()
    }

    pub async fn set_last_run(&self, check_id: Uuid, at: chrono::DateTime<Utc>) -> SchedulerResult<()> {
        sqlx::query("UPDATE schedules SET last_run = $2 WHERE check_id = $1")
            .bind(check_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    pub async fn set_next_run(&self, check_id: Uuid, at: chrono::DateTime<Utc>) -> SchedulerResult<()> {
        sqlx::query("UPDATE schedules SET next_run = $2 WHERE check_id = $1")
            .bind(check_id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}

fn row_to_schedule(row: PgRow) -> SchedulerResult<Schedule> {
    Ok(Schedule {
        check_id: row.try_get("check_id").map_err(map_db_err)?,
        cron_expression: row.try_get("cron_expression").map_err(map_db_err)?,
        timezone: row.try_get("timezone").map_err(map_db_err)?,
        is_active: row.try_get("is_active").map_err(map_db_err)?,
        next_run: row.try_get("next_run").map_err(map_db_err)?,
        last_run: row.try_get("last_run").map_err(map_db_err)?,
        created_at: row.try_get("created_at").map_err(map_db_err)?,
        updated_at: row.try_get("updated_at").map_err(map_db_err)?,
    })
}

fn map_db_err(e: sqlx::Error) -> SchedulerError {
    SchedulerError::Internal(format!("storage error: {e}"))
}
