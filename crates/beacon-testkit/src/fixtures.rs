//! Fixture builders and Postgres bootstrap shared by `tests/scenario_*.rs`
//! across the workspace.

use beacon_schemas::{CheckType, ConfigMap, NewCheck, NewSchedule};
use sqlx::PgPool;

/// `Some(url)` if `DB_URL` is set, else logs the same skip message every
/// DB-backed test in this workspace uses and returns `None`.
pub fn require_db_url() -> Option<String> {
    match std::env::var(beacon_db::ENV_DB_URL) {
        Ok(v) => Some(v),
        Err(_) => {
            eprintln!("SKIP: DB_URL not set");
            None
        }
    }
}

/// Connects and migrates, or returns `None` if no `DB_URL` is configured.
pub async fn test_pool() -> Option<PgPool> {
    let url = require_db_url()?;
    let pool = beacon_db::connect(&url, 1, 8)
        .await
        .expect("connect to postgres");
    beacon_db::migrate(&pool).await.expect("run migrations");
    Some(pool)
}

/// A minimal, valid HTTP check definition: `interval_seconds` is the only
/// field callers usually want to vary across scenarios.
pub fn http_check(name: &str, interval_seconds: i32) -> NewCheck {
    NewCheck {
        name: name.to_string(),
        description: Some("fixture check".into()),
        r#type: CheckType::Http,
        target: "https://example.com/".into(),
        config: ConfigMap::new(),
        interval_seconds,
        timeout_seconds: 10,
        enabled: true,
    }
}

pub fn http_check_with_priority(name: &str, interval_seconds: i32, priority: i64) -> NewCheck {
    let mut config = ConfigMap::new();
    config.set("priority", serde_json::json!(priority));
    NewCheck {
        config,
        ..http_check(name, interval_seconds)
    }
}

pub fn tcp_check(name: &str, interval_seconds: i32) -> NewCheck {
    NewCheck {
        r#type: CheckType::Tcp,
        target: "db.internal:5432".into(),
        ..http_check(name, interval_seconds)
    }
}

pub fn graphql_check(name: &str, interval_seconds: i32) -> NewCheck {
    let mut config = ConfigMap::new();
    config.set("query", serde_json::json!("{ __typename }"));
    NewCheck {
        r#type: CheckType::Graphql,
        target: "https://api.example.com/graphql".into(),
        config,
        ..http_check(name, interval_seconds)
    }
}

pub fn hourly_utc_schedule() -> NewSchedule {
    NewSchedule {
        cron_expression: "0 * * * *".into(),
        timezone: "UTC".into(),
        is_active: true,
    }
}
