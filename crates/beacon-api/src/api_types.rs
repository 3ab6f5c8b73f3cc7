//! Request and response types for every beacon-api endpoint.
//!
//! These types are `Serialize + Deserialize` so Axum can JSON-encode and
//! decode them directly. No business logic lives here — validation happens
//! in `beacon-db::validation` and is surfaced unchanged as `ErrorResponse`.

use beacon_dispatch::DispatchOutcome;
use beacon_schemas::{Check, ErrorKind, NewCheck, Schedule};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Error envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl ErrorResponse {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: kind.code_name(),
        }
    }
}

// ---------------------------------------------------------------------------
// POST /v1/checks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct CreateCheckRequest {
    pub tenant_id: String,
    #[serde(flatten)]
    pub check: NewCheck,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResponse {
    #[serde(flatten)]
    pub check: Check,
}

impl From<Check> for CheckResponse {
    fn from(check: Check) -> Self {
        Self { check }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/checks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ListChecksQuery {
    pub tenant_id: String,
    pub page_size: Option<i64>,
    pub page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListChecksResponse {
    pub checks: Vec<Check>,
    pub next_page_token: Option<String>,
}

// ---------------------------------------------------------------------------
// /v1/checks/:id/schedule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ScheduleResponse {
    #[serde(flatten)]
    pub schedule: Schedule,
}

impl From<Schedule> for ScheduleResponse {
    fn from(schedule: Schedule) -> Self {
        Self { schedule }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListSchedulesQuery {
    pub tenant_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListSchedulesResponse {
    pub schedules: Vec<Schedule>,
}

// ---------------------------------------------------------------------------
// /v1/scheduler/*
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerActionResponse {
    pub running: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatsResponse {
    pub running: bool,
    pub owner_id: String,
    pub due_now_count: usize,
    pub max_concurrent_tasks: usize,
    pub tick_interval_seconds: u64,
    pub lease_ttl_seconds: u64,
}

// ---------------------------------------------------------------------------
// POST /v1/checks/:id/execute
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteTaskResponse {
    pub outcome: ExecuteOutcome,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecuteOutcome {
    Dispatched,
    Skipped,
    Busy,
    Failed,
}

impl From<DispatchOutcome> for ExecuteOutcome {
    fn from(o: DispatchOutcome) -> Self {
        match o {
            DispatchOutcome::Dispatched => ExecuteOutcome::Dispatched,
            DispatchOutcome::Skipped => ExecuteOutcome::Skipped,
            DispatchOutcome::Busy => ExecuteOutcome::Busy,
            DispatchOutcome::Failed => ExecuteOutcome::Failed,
        }
    }
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    pub status: &'static str,
    pub uptime_seconds: u64,
}
