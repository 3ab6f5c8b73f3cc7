//! Durable CRUD of Check definitions.

use std::str::FromStr;

use beacon_schemas::{Check, CheckType, ConfigMap, NewCheck, SchedulerError, SchedulerResult};
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

use crate::validation::validate_new_check;

#[derive(Clone)]
pub struct CheckStore {
    pool: PgPool,
}

pub struct ListPage {
    pub checks: Vec<Check>,
    pub next_page_token: Option<String>,
}

impl CheckStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create_check(&self, tenant_id: &str, def: NewCheck) -> SchedulerResult<Check> {
        validate_new_check(tenant_id, &def)?;

        let id = Uuid::new_v4();
        let now = Utc::now();
        let next_run_at = if def.enabled {
            Some(now + chrono::Duration::seconds(def.interval_seconds as i64))
        } else {
            None
        };

        let config_json: serde_json::Value = def.config.clone().into();

        let row = sqlx::query(
            r#"
            INSERT INTO checks
                (id, tenant_id, name, description, type, target, config,
                 interval_seconds, timeout_seconds, enabled,
                 created_at, updated_at, last_run_at, next_run_at)
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,NULL,$13)
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tenant_id)
        .bind(&def.name)
        .bind(&def.description)
        .bind(def.r#type.as_str())
        .bind(&def.target)
        .bind(&config_json)
        .bind(def.interval_seconds)
        .bind(def.timeout_seconds)
        .bind(def.enabled)
        .bind(now)
        .bind(now)
        .bind(next_run_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_insert_err)?;

        row_to_check(row)
    }

    pub async fn update_check(&self, id: Uuid, def: NewCheck) -> SchedulerResult<Check> {
        let existing = self.get_check(id).await?;
        validate_new_check(&existing.tenant_id, &def)?;

        let now = Utc::now();
        let next_run_at = if def.enabled {
            Some(now + chrono::Duration::seconds(def.interval_seconds as i64))
        } else {
            None
        };
        let config_json: serde_json::Value = def.config.clone().into();

        let row = sqlx::query(
            r#"
            UPDATE checks SET
                name = $2, description = $3, type = $4, target = $5, config = $6,
                interval_seconds = $7, timeout_seconds = $8, enabled = $9,
                updated_at = $10, next_run_at = $11
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&def.name)
        .bind(&def.description)
        .bind(def.r#type.as_str())
        .bind(&def.target)
        .bind(&config_json)
        .bind(def.interval_seconds)
        .bind(def.timeout_seconds)
        .bind(def.enabled)
        .bind(now)
        .bind(next_run_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?
        .ok_or_else(|| SchedulerError::not_found(format!("check {id} not found")))?;

        row_to_check(row)
    }

    pub async fn delete_check(&self, id: Uuid) -> SchedulerResult<()> {
        let result = sqlx::query("DELETE FROM checks WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;

        if result.rows_affected() == 0 {
            return Err(SchedulerError::not_found(format!("check {id} not found")));
        }
        Ok(())
    }

    pub async fn get_check(&self, id: Uuid) -> SchedulerResult<Check> {
        let row = sqlx::query("SELECT * FROM checks WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| SchedulerError::not_found(format!("check {id} not found")))?;

        row_to_check(row)
    }

    pub async fn list_checks(
        &self,
        tenant_id: &str,
        page_size: i64,
        page_token: Option<String>,
    ) -> SchedulerResult<ListPage> {
        let page_size = page_size.clamp(1, 100);
        let cursor = page_token
            .as_deref()
            .map(parse_cursor)
            .transpose()?;

        let rows = match cursor {
            None => {
                sqlx::query(
                    "SELECT * FROM checks WHERE tenant_id = $1
                     ORDER BY created_at DESC, id DESC LIMIT $2",
                )
                .bind(tenant_id)
                .bind(page_size + 1)
                .fetch_all(&self.pool)
                .await
            }
            Some((created_at, id)) => {
                sqlx::query(
                    "SELECT * FROM checks WHERE tenant_id = $1
                     AND (created_at, id) < ($2, $3)
                     ORDER BY created_at DESC, id DESC LIMIT $4",
                )
                .bind(tenant_id)
                .bind(created_at)
                .bind(id)
                .bind(page_size + 1)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(map_db_err)?;

        let mut checks: Vec<Check> = rows
            .into_iter()
            .map(row_to_check)
            .collect::<SchedulerResult<_>>()?;

        let next_page_token = if checks.len() as i64 > page_size {
            let overflow = checks.split_off(page_size as usize);
            overflow
                .first()
                .map(|c| format!("{}|{}", c.created_at.to_rfc3339(), c.id))
                .or_else(|| checks.last().map(|c| format!("{}|{}", c.created_at.to_rfc3339(), c.id)))
        } else {
            None
        };

        Ok(ListPage {
            checks,
            next_page_token,
        })
    }

    /// Used by the Schedule Index on rebuild.
    pub async fn get_active_checks(&self) -> SchedulerResult<Vec<Check>> {
        let rows = sqlx::query("SELECT * FROM checks WHERE enabled = true")
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(row_to_check).collect()
    }

    pub async fn get_active_checks_by_tenant(&self, tenant_id: &str) -> SchedulerResult<Vec<Check>> {
        let rows = sqlx::query("SELECT * FROM checks WHERE enabled = true AND tenant_id = $1")
            .bind(tenant_id)
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_err)?;
        rows.into_iter().map(row_to_check).collect()
    }

    /// Narrow UPDATE, never read-then-write ( shared-resource policy).
    pub async fn set_last_run(&self, id: Uuid, at: DateTime<Utc>) -> SchedulerResult<()> {
        sqlx::query("UPDATE checks SET last_run_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }

    pub async fn set_next_run(&self, id: Uuid, at: Option<DateTime<Utc>>) -> SchedulerResult<()> {
        sqlx::query("UPDATE checks SET next_run_at = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(())
    }
}

fn parse_cursor(token: &str) -> SchedulerResult<(DateTime<Utc>, Uuid)> {
    let (ts, id) = token
        .split_once('|')
        .ok_or_else(|| SchedulerError::validation("malformed page_token"))?;
    let ts = DateTime::parse_from_rfc3339(ts)
        .map_err(|e| SchedulerError::validation(format!("malformed page_token timestamp: {e}")))?
        .with_timezone(&Utc);
    let id = Uuid::from_str(id)
        .map_err(|e| SchedulerError::validation(format!("malformed page_token id: {e}")))?;
    Ok((ts, id))
}

fn row_to_check(row: PgRow) -> SchedulerResult<Check> {
    let type_str: String = row.try_get("type").map_err(map_db_err)?;
    let r#type = CheckType::from_str(&type_str).map_err(SchedulerError::internal)?;
    let config_json: serde_json::Value = row.try_get("config").map_err(map_db_err)?;

    Ok(Check {
        id: row.try_get("id").map_err(map_db_err)?,
        tenant_id: row.try_get("tenant_id").map_err(map_db_err)?,
        name: row.try_get("name").map_err(map_db_err)?,
        description: row.try_get("description").map_err(map_db_err)?,
        r#type,
        target: row.try_get("target").map_err(map_db_err)?,
        config: ConfigMap::from(config_json),
        interval_seconds: row.try_get("interval_seconds").map_err(map_db_err)?,
        timeout_seconds: row.try_get("timeout_seconds").map_err(map_db_err)?,
        enabled: row.try_get("enabled").map_err(map_db_err)?,
        created_at: row.try_get("created_at").map_err(map_db_err)?,
        updated_at: row.try_get("updated_at").map_err(map_db_err)?,
        last_run_at: row.try_get("last_run_at").map_err(map_db_err)?,
        next_run_at: row.try_get("next_run_at").map_err(map_db_err)?,
    })
}

fn map_insert_err(e: sqlx::Error) -> SchedulerError {
    if is_unique_constraint_violation(&e) {
        SchedulerError::Conflict("check with this id already exists".into())
    } else {
        map_db_err(e)
    }
}

fn map_db_err(e: sqlx::Error) -> SchedulerError {
    SchedulerError::Internal(format!("storage error: {e}"))
}

pub fn is_unique_constraint_violation(e: &sqlx::Error) -> bool {
    matches!(
        e,
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505")
    )
}
