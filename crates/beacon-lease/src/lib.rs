//! Redis-backed named leases with TTL, fencing, and owner-bound release.
//!
//! Grounded on the conditional-set-with-TTL / Lua compare-and-delete pattern
//! used for distributed locking: `SET key value NX EX ttl` to acquire,
//! a scripted GET-compare-DEL to release without racing a concurrent
//! acquirer. The owner identity is embedded in the stored JSON value rather
//! than used as the Redis value directly, since `inspect`/`is_held` need the
//! full `{owner_id, acquired_at, expires_at}` triple back out.
//!
//! `LeaseManager` is a trait (mirroring `beacon-publisher::TaskPublisher`'s
//! trait-plus-adapter split) so the Dispatcher's at-most-one-concurrent-
//! dispatch and fencing behavior can be exercised against
//! `InMemoryLeaseManager` without a live Redis instance.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use beacon_schemas::{Lease, SchedulerResult};
use chrono::Utc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    Acquired(Lease),
    Busy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Ok,
    NotOwner,
    Gone,
}

#[async_trait]
pub trait LeaseManager: Send + Sync {
    async fn try_acquire(
        &self,
        check_id: Uuid,
        owner_id: &str,
        ttl: Duration,
    ) -> SchedulerResult<AcquireOutcome>;

    async fn release(&self, check_id: Uuid, owner_id: &str) -> SchedulerResult<ReleaseOutcome>;

    async fn is_held(&self, check_id: Uuid) -> SchedulerResult<bool> {
        Ok(self.inspect(check_id).await?.is_some())
    }

    async fn inspect(&self, check_id: Uuid) -> SchedulerResult<Option<Lease>>;
}

pub mod redis_lease;
pub use redis_lease::RedisLeaseManager;

/// In-process double of the Redis lease contract: same acquire/fencing
/// semantics, keyed by `check_id`, with TTL expiry checked against wall
/// clock on every call rather than relying on Redis's own expiry sweep.
/// Used by `beacon-testkit` scenario tests and by unit tests in this crate.
#[derive(Default)]
pub struct InMemoryLeaseManager {
    leases: Mutex<HashMap<Uuid, Lease>>,
}

impl InMemoryLeaseManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LeaseManager for InMemoryLeaseManager {
    async fn try_acquire(
        &self,
        check_id: Uuid,
        owner_id: &str,
        ttl: Duration,
    ) -> SchedulerResult<AcquireOutcome> {
        let now = Utc::now();
        let mut leases = self.leases.lock().unwrap();

        if let Some(existing) = leases.get(&check_id) {
            if existing.is_live(now) {
                return Ok(AcquireOutcome::Busy);
            }
        }

        let lease = Lease {
            check_id,
            owner_id: owner_id.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        };
        leases.insert(check_id, lease.clone());
        Ok(AcquireOutcome::Acquired(lease))
    }

    async fn release(&self, check_id: Uuid, owner_id: &str) -> SchedulerResult<ReleaseOutcome> {
        let mut leases = self.leases.lock().unwrap();
        match leases.get(&check_id) {
            None => Ok(ReleaseOutcome::Gone),
            Some(existing) if existing.owner_id == owner_id => {
                leases.remove(&check_id);
                Ok(ReleaseOutcome::Ok)
            }
            Some(_) => Ok(ReleaseOutcome::NotOwner),
        }
    }

    async fn inspect(&self, check_id: Uuid) -> SchedulerResult<Option<Lease>> {
        let now = Utc::now();
        let leases = self.leases.lock().unwrap();
        Ok(leases.get(&check_id).filter(|l| l.is_live(now)).cloned())
    }
}
