//! In-process scenario test for the Check CRUD surface of the Admin API:
//! create, read, list, update, delete, each driven straight through
//! `routes::build_router` with `tower::ServiceExt::oneshot` — no TCP socket.
//!
//! DB-backed: skipped if `DB_URL` is not set (local + CI friendly), matching
//! the skip convention used across this workspace's other DB-backed tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use beacon_api::state::AppState;
use beacon_api::{rate_limit::RateLimiter, routes};
use beacon_config::{AdminConfig, BrokerConfig, DbConfig, RedisConfig, SchedulerConfig, TuningConfig};
use beacon_db::{CheckStore, ScheduleStore, TaskStore};
use beacon_dispatch::{Dispatcher, TickLoop};
use beacon_index::ScheduleIndex;
use beacon_lease::InMemoryLeaseManager;
use beacon_publisher::InMemoryPublisher;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

async fn make_state() -> Option<Arc<AppState>> {
    let url = match std::env::var(beacon_db::ENV_DB_URL) {
        Ok(v) => v,
        Err(_) => {
            eprintln!("SKIP: DB_URL not set");
            return None;
        }
    };

    let pool = beacon_db::connect(&url, 1, 4).await.expect("connect");
    beacon_db::migrate(&pool).await.expect("migrate");

    let check_store = Arc::new(CheckStore::new(pool.clone()));
    let schedule_store = Arc::new(ScheduleStore::new(pool.clone()));
    let task_store = Arc::new(TaskStore::new(pool));
    let index = Arc::new(ScheduleIndex::new());

    let dispatcher = Arc::new(Dispatcher {
        owner_id: "test-owner".into(),
        check_store: Arc::clone(&check_store),
        schedule_store: Arc::clone(&schedule_store),
        task_store: Arc::clone(&task_store),
        lease_manager: Arc::new(InMemoryLeaseManager::new()),
        publisher: Arc::new(InMemoryPublisher::new()),
        index: Arc::clone(&index),
        lease_ttl: Duration::from_secs(300),
    });
    let tick_loop = Arc::new(TickLoop::new(
        Arc::clone(&dispatcher),
        Arc::clone(&index),
        Duration::from_secs(1),
        10,
        Duration::from_secs(5),
    ));

    let config = Arc::new(SchedulerConfig {
        db: DbConfig {
            url: url.clone(),
            min_connections: 1,
            max_connections: 4,
        },
        redis: RedisConfig {
            url: "redis://localhost:6379".into(),
            pool_size: 1,
        },
        broker: BrokerConfig {
            url: "amqp://localhost:5672/%2f".into(),
            task_exchange: "checks.tasks".into(),
            result_exchange: "checks.results".into(),
            result_queue: "scheduler.results".into(),
            prefetch: 10,
            publish_timeout: Duration::from_secs(10),
            retry_base: Duration::from_secs(1),
            retry_multiplier: 2.0,
            retry_max_delay: Duration::from_secs(30),
            retry_attempts: 3,
            retry_jitter_pct: 0.25,
        },
        tuning: TuningConfig::default(),
        admin: AdminConfig {
            trusted_proxies: Vec::new(),
            bind_addr: "127.0.0.1:0".into(),
            rate_limit_per_minute: 0,
        },
        owner_id: "test-owner".into(),
    });

    Some(Arc::new(AppState {
        check_store,
        schedule_store,
        task_store,
        index,
        dispatcher,
        tick_loop,
        config,
        rate_limiter: RateLimiter::new(),
        started_at: Instant::now(),
    }))
}

async fn call(router: axum::Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = router.oneshot(req).await.expect("oneshot failed");
    let status = resp.status();
    let bytes = resp.into_body().collect().await.expect("collect body").to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body is valid json")
    };
    (status, body)
}

#[tokio::test]
async fn create_get_update_list_delete_round_trip() {
    let Some(state) = make_state().await else { return };
    let tenant = format!("tenant-{}", Uuid::new_v4());

    let create_body = json!({
        "tenant_id": tenant,
        "name": "homepage",
        "description": "prod homepage",
        "type": "https",
        "target": "https://example.com",
        "config": {"method": "GET", "expected_status": 200},
        "interval_seconds": 60,
        "timeout_seconds": 10,
        "enabled": true,
    });

    let router = routes::build_router(Arc::clone(&state));
    let req = Request::builder()
        .method("POST")
        .uri("/v1/checks")
        .header("content-type", "application/json")
        .body(Body::from(create_body.to_string()))
        .unwrap();
    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::CREATED);
    let check_id = body["id"].as_str().expect("id present").to_string();
    assert_eq!(body["tenant_id"], tenant);
    assert!(body["next_run_at"].is_string(), "enabled check must have next_run_at");

    let router = routes::build_router(Arc::clone(&state));
    let req = Request::builder()
        .method("GET")
        .uri(format!("/v1/checks/{check_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "homepage");

    let router = routes::build_router(Arc::clone(&state));
    let req = Request::builder()
        .method("GET")
        .uri(format!("/v1/checks?tenant_id={tenant}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checks"].as_array().unwrap().len(), 1);

    let update_body = json!({
        "name": "homepage-v2",
        "description": "prod homepage",
        "type": "https",
        "target": "https://example.com",
        "config": {"method": "GET", "expected_status": 200},
        "interval_seconds": 120,
        "timeout_seconds": 10,
        "enabled": false,
    });
    let router = routes::build_router(Arc::clone(&state));
    let req = Request::builder()
        .method("PUT")
        .uri(format!("/v1/checks/{check_id}"))
        .header("content-type", "application/json")
        .body(Body::from(update_body.to_string()))
        .unwrap();
    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "homepage-v2");
    assert_eq!(body["enabled"], false);
    assert!(state.index.is_empty().await, "disabling a check removes it from the index");

    let router = routes::build_router(Arc::clone(&state));
    let req = Request::builder()
        .method("DELETE")
        .uri(format!("/v1/checks/{check_id}"))
        .body(Body::empty())
        .unwrap();
    let resp = router.oneshot(req).await.expect("oneshot failed");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let router = routes::build_router(Arc::clone(&state));
    let req = Request::builder()
        .method("GET")
        .uri(format!("/v1/checks/{check_id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(router, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_positive_uptime() {
    let Some(state) = make_state().await else { return };
    tokio::time::sleep(Duration::from_millis(5)).await;
    let router = routes::build_router(state);
    let req = Request::builder()
        .method("GET")
        .uri("/v1/health")
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(router, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["healthy"], true);
}
