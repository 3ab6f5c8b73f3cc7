//! beacon-api entry point: the composition root.
//!
//! This file is intentionally thin: it loads config, connects every external
//! system (Postgres, Redis, the broker), wires the Scheduler Core components
//! together, and starts the HTTP server. All route handlers live in
//! `routes.rs`; all shared state lives in `state.rs`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use beacon_api::{routes, state::AppState};
use beacon_config::SchedulerConfig;
use beacon_db::{CheckStore, ScheduleStore, TaskStore};
use beacon_dispatch::{Dispatcher, TickLoop};
use beacon_index::ScheduleIndex;
use beacon_lease::RedisLeaseManager;
use beacon_publisher::amqp::AmqpPublisher;
use beacon_publisher::RetryPolicy;
use beacon_reconciler::amqp_source::AmqpResultSource;
use beacon_reconciler::{run_orphan_sweep_loop, run_reconcile_loop, EventSink, RecordingEventSink};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Silent if the file does not exist — production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = Arc::new(SchedulerConfig::from_env().context("load scheduler config")?);

    let pool = beacon_db::connect(&config.db.url, config.db.min_connections, config.db.max_connections)
        .await
        .context("connect to postgres")?;
    beacon_db::migrate(&pool).await.context("run migrations")?;

    let check_store = Arc::new(CheckStore::new(pool.clone()));
    let schedule_store = Arc::new(ScheduleStore::new(pool.clone()));
    let task_store = Arc::new(TaskStore::new(pool));

    let index = Arc::new(ScheduleIndex::new());
    let active = check_store
        .get_active_checks()
        .await
        .context("load active checks for index rebuild")?;
    index.rebuild(&active).await;
    info!(checks = active.len(), "schedule index rebuilt from store");

    let lease_manager: Arc<dyn beacon_lease::LeaseManager> = Arc::new(
        RedisLeaseManager::connect(&config.redis.url)
            .await
            .context("connect to redis")?,
    );

    let retry = RetryPolicy {
        base: config.broker.retry_base,
        multiplier: config.broker.retry_multiplier,
        max_delay: config.broker.retry_max_delay,
        attempts: config.broker.retry_attempts,
        jitter_pct: config.broker.retry_jitter_pct,
    };
    let publisher: Arc<dyn beacon_publisher::TaskPublisher> = Arc::new(
        AmqpPublisher::connect(
            &config.broker.url,
            &config.broker.task_exchange,
            config.broker.publish_timeout,
            retry,
        )
        .await
        .context("connect amqp task publisher")?,
    );

    let dispatcher = Arc::new(Dispatcher {
        owner_id: config.owner_id.clone(),
        check_store: Arc::clone(&check_store),
        schedule_store: Arc::clone(&schedule_store),
        task_store: Arc::clone(&task_store),
        lease_manager,
        publisher,
        index: Arc::clone(&index),
        lease_ttl: config.tuning.lease_ttl,
    });

    let tick_loop = Arc::new(TickLoop::new(
        Arc::clone(&dispatcher),
        Arc::clone(&index),
        config.tuning.tick_interval,
        config.tuning.max_concurrent_tasks,
        config.tuning.shutdown_timeout,
    ));
    tick_loop.start();

    let event_sink: Arc<dyn EventSink> = Arc::new(RecordingEventSink::new());
    let result_source = AmqpResultSource::connect(&config.broker.url, config.broker.prefetch)
        .await
        .context("connect amqp result source")?;
    let reconcile_stop = Arc::new(tokio::sync::Notify::new());
    tokio::spawn(run_reconcile_loop(
        Arc::clone(&task_store),
        event_sink,
        Box::new(result_source),
        Arc::clone(&reconcile_stop),
    ));

    let orphan_stop = Arc::new(tokio::sync::Notify::new());
    tokio::spawn(run_orphan_sweep_loop(
        Arc::clone(&task_store),
        Arc::clone(&check_store),
        Arc::clone(&schedule_store),
        Arc::clone(&index),
        config.tuning.cleanup_interval,
        config.tuning.task_orphan_timeout,
        Arc::clone(&orphan_stop),
    ));

    let state = Arc::new(AppState {
        check_store,
        schedule_store,
        task_store,
        index,
        dispatcher,
        tick_loop: Arc::clone(&tick_loop),
        config: Arc::clone(&config),
        rate_limiter: beacon_api::rate_limit::RateLimiter::new(),
        started_at: Instant::now(),
    });

    let app = routes::build_router(Arc::clone(&state))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    let addr: SocketAddr = config
        .admin
        .bind_addr
        .parse()
        .with_context(|| format!("parse ADMIN_BIND_ADDR {}", config.admin.bind_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    info!("beacon-api listening on http://{addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server crashed")?;

    tick_loop.stop().await;
    reconcile_stop.notify_waiters();
    orphan_stop.notify_waiters();

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}
