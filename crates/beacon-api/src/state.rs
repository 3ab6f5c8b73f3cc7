//! Shared runtime state for beacon-api: the composition root's handles to
//! every Scheduler Core component, wired together in `main.rs`.
//!
//! All handlers receive `State<Arc<AppState>>`; this module owns nothing
//! async itself beyond what its fields already guard internally.

use std::sync::Arc;
use std::time::Instant;

use beacon_config::SchedulerConfig;
use beacon_db::{CheckStore, ScheduleStore, TaskStore};
use beacon_dispatch::{Dispatcher, TickLoop};
use beacon_index::ScheduleIndex;

use crate::rate_limit::RateLimiter;

pub struct AppState {
    pub check_store: Arc<CheckStore>,
    pub schedule_store: Arc<ScheduleStore>,
    pub task_store: Arc<TaskStore>,
    pub index: Arc<ScheduleIndex>,
    pub dispatcher: Arc<Dispatcher>,
    pub tick_loop: Arc<TickLoop>,
    pub config: Arc<SchedulerConfig>,
    pub rate_limiter: RateLimiter,
    pub started_at: Instant,
}

impl AppState {
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
