//! Axum router and all HTTP handlers for beacon-api.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. All handlers are `pub(crate)` so the scenario tests in
//! `tests/` can compose the router directly.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use beacon_schemas::{NewSchedule, SchedulerError};
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::api_types::{
    CheckResponse, CreateCheckRequest, ErrorResponse, ExecuteTaskResponse, HealthResponse,
    ListChecksQuery, ListChecksResponse, ListSchedulesQuery, ListSchedulesResponse,
    ScheduleResponse, SchedulerActionResponse, SchedulerStatsResponse,
};
use crate::rate_limit;
use crate::state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/checks", post(create_check).get(list_checks))
        .route(
            "/v1/checks/:id",
            get(get_check).put(update_check).delete(delete_check),
        )
        .route(
            "/v1/checks/:id/schedule",
            post(schedule_check).get(get_schedule).delete(unschedule_check),
        )
        .route("/v1/checks/:id/execute", post(execute_task))
        .route("/v1/schedules", get(list_schedules))
        .route("/v1/scheduler/start", post(start_scheduler))
        .route("/v1/scheduler/stop", post(stop_scheduler))
        .route("/v1/scheduler/stats", get(scheduler_stats))
        .route("/v1/health", get(health))
        .route_layer(axum::middleware::from_fn_with_state(
            Arc::clone(&state),
            rate_limit::enforce,
        ))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping: one-to-one ErrorKind → HTTP status + code
// ---------------------------------------------------------------------------

struct ApiError(SchedulerError);

impl From<SchedulerError> for ApiError {
    fn from(e: SchedulerError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        tracing::warn!(error = %self.0, code = kind.code_name(), "admin api request failed");
        let status = StatusCode::from_u16(kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(ErrorResponse::new(kind, self.0.to_string()))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---------------------------------------------------------------------------
// POST /v1/checks, GET /v1/checks
// ---------------------------------------------------------------------------

pub(crate) async fn create_check(
    State(st): State<Arc<AppState>>,
    Json(req): Json<CreateCheckRequest>,
) -> ApiResult<Response> {
    let check = st.check_store.create_check(&req.tenant_id, req.check).await?;
    if check.enabled {
        if let Some(next_run_at) = check.next_run_at {
            st.index.upsert(check.id, next_run_at, check.task_priority()).await;
        }
    }
    Ok((StatusCode::CREATED, Json(CheckResponse::from(check))).into_response())
}

pub(crate) async fn list_checks(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListChecksQuery>,
) -> ApiResult<Json<ListChecksResponse>> {
    let page = st
        .check_store
        .list_checks(&q.tenant_id, q.page_size.unwrap_or(20), q.page_token)
        .await?;
    Ok(Json(ListChecksResponse {
        checks: page.checks,
        next_page_token: page.next_page_token,
    }))
}

// ---------------------------------------------------------------------------
// GET/PUT/DELETE /v1/checks/:id
// ---------------------------------------------------------------------------

pub(crate) async fn get_check(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<CheckResponse>> {
    let check = st.check_store.get_check(id).await?;
    Ok(Json(CheckResponse::from(check)))
}

pub(crate) async fn update_check(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(def): Json<beacon_schemas::NewCheck>,
) -> ApiResult<Json<CheckResponse>> {
    let check = st.check_store.update_check(id, def).await?;
    match check.next_run_at {
        Some(next_run_at) if check.enabled => {
            st.index.upsert(check.id, next_run_at, check.task_priority()).await;
        }
        _ => st.index.remove(check.id).await,
    }
    Ok(Json(CheckResponse::from(check)))
}

pub(crate) async fn delete_check(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    st.check_store.delete_check(id).await?;
    st.index.remove(id).await;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// /v1/checks/:id/schedule
// ---------------------------------------------------------------------------

pub(crate) async fn schedule_check(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(def): Json<NewSchedule>,
) -> ApiResult<Json<ScheduleResponse>> {
    // ScheduleCheck attaches/replaces a cron override; the Check must
    // exist so its next_run_at can be recomputed under the new schedule.
    let check = st.check_store.get_check(id).await?;
    let schedule = st.schedule_store.create_schedule(id, def).await?;

    if check.enabled {
        let now = chrono::Utc::now();
        let next_run_at = beacon_db::next_due(&check, Some(&schedule), now)?;
        st.check_store.set_next_run(id, Some(next_run_at)).await?;
        st.index.upsert(id, next_run_at, check.task_priority()).await;
    }

    Ok(Json(ScheduleResponse::from(schedule)))
}

pub(crate) async fn get_schedule(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ScheduleResponse>> {
    let schedule = st
        .schedule_store
        .get_schedule_by_check(id)
        .await?
        .ok_or_else(|| SchedulerError::not_found(format!("no schedule attached to check {id}")))?;
    Ok(Json(ScheduleResponse::from(schedule)))
}

pub(crate) async fn unschedule_check(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    st.schedule_store.delete_schedule_by_check(id).await?;

    // Falling back to the plain interval changes next_run_at; recompute and
    // re-upsert the same way schedule_check does.
    if let Ok(check) = st.check_store.get_check(id).await {
        if check.enabled {
            let now = chrono::Utc::now();
            if let Ok(next_run_at) = beacon_db::next_due(&check, None, now) {
                st.check_store.set_next_run(id, Some(next_run_at)).await.ok();
                st.index.upsert(id, next_run_at, check.task_priority()).await;
            }
        }
    }

    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn list_schedules(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ListSchedulesQuery>,
) -> ApiResult<Json<ListSchedulesResponse>> {
    let schedules = st.schedule_store.list_schedules(&q.tenant_id).await?;
    Ok(Json(ListSchedulesResponse { schedules }))
}

// ---------------------------------------------------------------------------
// /v1/scheduler/*
// ---------------------------------------------------------------------------

pub(crate) async fn start_scheduler(State(st): State<Arc<AppState>>) -> Json<SchedulerActionResponse> {
    st.tick_loop.start();
    tracing::info!("scheduler started via admin api");
    Json(SchedulerActionResponse {
        running: st.tick_loop.is_running(),
    })
}

pub(crate) async fn stop_scheduler(State(st): State<Arc<AppState>>) -> Json<SchedulerActionResponse> {
    st.tick_loop.stop().await;
    tracing::info!("scheduler stopped via admin api");
    Json(SchedulerActionResponse {
        running: st.tick_loop.is_running(),
    })
}

pub(crate) async fn scheduler_stats(State(st): State<Arc<AppState>>) -> Json<SchedulerStatsResponse> {
    let due_now_count = st
        .index
        .due_before(chrono::Utc::now(), usize::MAX)
        .await
        .len();

    Json(SchedulerStatsResponse {
        running: st.tick_loop.is_running(),
        owner_id: st.config.owner_id.clone(),
        due_now_count,
        max_concurrent_tasks: st.config.tuning.max_concurrent_tasks,
        tick_interval_seconds: st.config.tuning.tick_interval.as_secs(),
        lease_ttl_seconds: st.config.tuning.lease_ttl.as_secs(),
    })
}

// ---------------------------------------------------------------------------
// POST /v1/checks/:id/execute — manual fire, still through the Dispatcher
// ---------------------------------------------------------------------------

pub(crate) async fn execute_task(
    State(st): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ExecuteTaskResponse>> {
    // Confirm the check exists so a bad id surfaces as 404 rather than a
    // silently-dropped dispatch (dispatch_manual never returns `Err`).
    st.check_store.get_check(id).await?;
    let outcome = st.dispatcher.dispatch_manual(id).await;
    Ok(Json(ExecuteTaskResponse {
        outcome: outcome.into(),
    }))
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        healthy: true,
        status: "ok",
        uptime_seconds: st.uptime_seconds(),
    })
}

