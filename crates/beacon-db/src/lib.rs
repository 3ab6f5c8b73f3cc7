// crates/beacon-db/src/lib.rs
use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};

pub mod check_store;
pub mod schedule_store;
pub mod scheduling;
pub mod task_store;
pub mod validation;

pub use check_store::CheckStore;
pub use schedule_store::ScheduleStore;
pub use scheduling::next_due;
pub use task_store::TaskStore;

pub const ENV_DB_URL: &str = "DB_URL";

/// Connect to Postgres using `DB_URL` ( config knobs).
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL).with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url, 5, 20).await
}

pub async fn connect(url: &str, min_connections: u32, max_connections: u32) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .min_connections(min_connections)
        .max_connections(max_connections)
        .test_before_acquire(true)
        .max_lifetime(std::time::Duration::from_secs(30 * 60))
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Test helper: connect using `DB_URL` and ensure migrations are applied.
pub async fn testkit_db_pool() -> Result<PgPool> {
    let pool = connect_from_env().await?;
    migrate(&pool).await?;
    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Connectivity + schema presence check, surfaced by the Admin API's
/// `HealthCheck` method.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    Ok(DbStatus { connected: one == 1 })
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub connected: bool,
}
