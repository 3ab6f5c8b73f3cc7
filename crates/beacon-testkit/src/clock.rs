//! Deterministic instant source for scenario tests that need to reason
//! about specific wall-clock moments (cron fire times, orphan-sweep
//! cutoffs) without racing the real clock.
//!
//! Not wired into any production code path: every Scheduler Core component
//! calls `Utc::now()` directly, matching this codebase's own convention of
//! covering time-sensitive logic with short TTLs and `tokio::time::sleep`
//! rather than threading a `Clock` trait through every layer (see
//! `beacon-lease`'s fencing test). `FakeClock` exists purely so fixtures
//! can construct `Check`/`Task`/`Lease` values anchored to a chosen instant.

use std::sync::Mutex;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
}

impl FakeClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn real() -> Self {
        Self::at(Utc::now())
    }

    pub fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    pub fn advance(&self, by: ChronoDuration) -> DateTime<Utc> {
        let mut now = self.now.lock().unwrap();
        *now += by;
        *now
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock().unwrap() = at;
    }
}
