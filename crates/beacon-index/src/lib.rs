//! The Schedule Index: an in-process, unsynchronized-across-replicas view of
//! "which checks are due next", rebuilt from the Check Store on start and
//! mutated incrementally by the Admin API and the Dispatcher.
//!
//! Coordination across replicas happens at the Lease Manager, never here:
//! two replicas can both believe the same check is due in the same
//! tick, and both will attempt dispatch — the lease is what serializes them.

use std::collections::{BTreeSet, HashMap};

use beacon_schemas::Check;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct DueEntry {
    next_run_at: DateTime<Utc>,
    check_id: Uuid,
}

#[derive(Default)]
struct Inner {
    by_due: BTreeSet<DueEntry>,
    priority: HashMap<Uuid, i32>,
}

/// Single owned instance injected into the Tick Loop, Dispatcher, and Admin
/// API. Its mutex is internal — callers never see the lock.
#[derive(Default)]
pub struct ScheduleIndex {
    inner: RwLock<Inner>,
}

impl ScheduleIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from a full snapshot of enabled checks, discarding prior state.
    /// Called on process start and by the periodic reconcile job.
    pub async fn rebuild(&self, checks: &[Check]) {
        let mut inner = Inner::default();
        for check in checks {
            if let Some(next_run_at) = check.next_run_at {
                inner.by_due.insert(DueEntry {
                    next_run_at,
                    check_id: check.id,
                });
                inner.priority.insert(check.id, check.task_priority());
            }
        }
        *self.inner.write().await = inner;
    }

    /// Insert or replace a check's due entry (new check enabled, or an
    /// existing check's next_run_at/priority changed).
    pub async fn upsert(&self, check_id: Uuid, next_run_at: DateTime<Utc>, priority: i32) {
        let mut inner = self.inner.write().await;
        inner.by_due.retain(|e| e.check_id != check_id);
        inner.by_due.insert(DueEntry {
            next_run_at,
            check_id,
        });
        inner.priority.insert(check_id, priority);
    }

    /// Remove a check entirely (disabled, deleted, or unscheduled).
    pub async fn remove(&self, check_id: Uuid) {
        let mut inner = self.inner.write().await;
        inner.by_due.retain(|e| e.check_id != check_id);
        inner.priority.remove(&check_id);
    }

    /// Checks with `next_run_at <= now`, ordered `(priority DESC, next_run_at
    /// ASC)` per the Dispatcher's tie-break rule, capped at `limit`.
    pub async fn due_before(&self, now: DateTime<Utc>, limit: usize) -> Vec<Uuid> {
        let inner = self.inner.read().await;
        let mut due: Vec<DueEntry> = inner
            .by_due
            .iter()
            .take_while(|e| e.next_run_at <= now)
            .cloned()
            .collect();

        due.sort_by(|a, b| {
            let pa = inner.priority.get(&a.check_id).copied().unwrap_or(0);
            let pb = inner.priority.get(&b.check_id).copied().unwrap_or(0);
            pb.cmp(&pa).then(a.next_run_at.cmp(&b.next_run_at))
        });

        due.into_iter().take(limit).map(|e| e.check_id).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.by_due.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    fn ts(offset_secs: i64) -> DateTime<Utc> {
        Utc::now() + ChronoDuration::seconds(offset_secs)
    }

    #[tokio::test]
    async fn due_before_orders_by_priority_desc_then_next_run_asc() {
        let index = ScheduleIndex::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();

        // a: due earliest but low priority
        index.upsert(a, ts(-10), 1).await;
        // b: due later, high priority -> should come first
        index.upsert(b, ts(-5), 4).await;
        // c: due earliest among equal priority
        index.upsert(c, ts(-20), 1).await;

        let due = index.due_before(Utc::now(), 10).await;
        assert_eq!(due, vec![b, c, a]);
    }

    #[tokio::test]
    async fn due_before_respects_limit_and_future_entries_excluded() {
        let index = ScheduleIndex::new();
        let due_now = Uuid::new_v4();
        let not_yet = Uuid::new_v4();

        index.upsert(due_now, ts(-1), 2).await;
        index.upsert(not_yet, ts(3600), 2).await;

        let due = index.due_before(Utc::now(), 10).await;
        assert_eq!(due, vec![due_now]);
    }

    #[tokio::test]
    async fn remove_drops_entry_from_future_queries() {
        let index = ScheduleIndex::new();
        let id = Uuid::new_v4();
        index.upsert(id, ts(-1), 2).await;
        assert_eq!(index.len().await, 1);

        index.remove(id).await;
        assert_eq!(index.len().await, 0);
        assert!(index.due_before(Utc::now(), 10).await.is_empty());
    }
}
