//! `next_due` — the single definition of "when does this Check run next",
//! shared by the Dispatcher (after a successful publish) and the Result
//! Reconciler (after reaping an orphan task). Vixie-style 5-field cron
//! semantics via the `cron` crate: `*/5 * * * *` fires on minutes that are
//! multiples of 5, not 5 minutes after whatever minute evaluation starts.

use std::str::FromStr;

use beacon_schemas::{Check, SchedulerError, SchedulerResult, Schedule};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

pub fn next_due(
    check: &Check,
    schedule: Option<&Schedule>,
    now: DateTime<Utc>,
) -> SchedulerResult<DateTime<Utc>> {
    match schedule {
        Some(s) if s.is_active => next_due_cron(s, now),
        _ => Ok(now + chrono::Duration::seconds(check.interval_seconds as i64)),
    }
}

fn next_due_cron(schedule: &Schedule, now: DateTime<Utc>) -> SchedulerResult<DateTime<Utc>> {
    let tz: Tz = schedule
        .timezone
        .parse()
        .map_err(|_| SchedulerError::validation(format!("invalid timezone: {}", schedule.timezone)))?;

    let with_seconds = format!("0 {}", schedule.cron_expression);
    let cron_schedule = cron::Schedule::from_str(&with_seconds)
        .map_err(|e| SchedulerError::validation(format!("invalid cron_expression: {e}")))?;

    let now_in_tz = now.with_timezone(&tz);
    let next = cron_schedule
        .after(&now_in_tz)
        .next()
        .ok_or_else(|| SchedulerError::internal("cron schedule has no future fire time"))?;

    Ok(next.with_timezone(&Utc))
}
