//! Redis-backed `LeaseManager` implementation.

use std::time::Duration;

use async_trait::async_trait;
use beacon_schemas::{Lease, SchedulerError, SchedulerResult};
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use uuid::Uuid;

use crate::{AcquireOutcome, LeaseManager, ReleaseOutcome};

/// Compare-and-delete: only remove the key if its stored owner_id still
/// matches the caller. Prevents a dispatcher that overran its TTL from
/// deleting the next owner's fresh lease (fencing).
const RELEASE_SCRIPT: &str = r#"
local raw = redis.call("GET", KEYS[1])
if raw == false then
  return 0
end
local ok, decoded = pcall(cjson.decode, raw)
if not ok then
  return 0
end
if decoded["owner_id"] == ARGV[1] then
  redis.call("DEL", KEYS[1])
  return 1
end
return 0
"#;

#[derive(Clone)]
pub struct RedisLeaseManager {
    conn: ConnectionManager,
}

impl RedisLeaseManager {
    pub async fn connect(redis_url: &str) -> SchedulerResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| SchedulerError::internal(format!("redis client open: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("redis connect: {e}")))?;
        Ok(Self { conn })
    }

    fn key(check_id: Uuid) -> String {
        format!("lock:check:{check_id}")
    }
}

#[async_trait]
impl LeaseManager for RedisLeaseManager {
    async fn try_acquire(
        &self,
        check_id: Uuid,
        owner_id: &str,
        ttl: Duration,
    ) -> SchedulerResult<AcquireOutcome> {
        let now = Utc::now();
        let lease = Lease {
            check_id,
            owner_id: owner_id.to_string(),
            acquired_at: now,
            expires_at: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        };
        let value = serde_json::to_string(&lease)
            .map_err(|e| SchedulerError::internal(format!("serialize lease: {e}")))?;

        let mut conn = self.conn.clone();
        let set: Option<String> = redis::cmd("SET")
            .arg(Self::key(check_id))
            .arg(&value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("redis SET NX: {e}")))?;

        match set {
            Some(_) => Ok(AcquireOutcome::Acquired(lease)),
            None => Ok(AcquireOutcome::Busy),
        }
    }

    async fn release(&self, check_id: Uuid, owner_id: &str) -> SchedulerResult<ReleaseOutcome> {
        let mut conn = self.conn.clone();
        let script = redis::Script::new(RELEASE_SCRIPT);
        let deleted: i32 = script
            .key(Self::key(check_id))
            .arg(owner_id)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("redis release script: {e}")))?;

        match deleted {
            1 => Ok(ReleaseOutcome::Ok),
            0 => match self.inspect(check_id).await? {
                Some(_) => Ok(ReleaseOutcome::NotOwner),
                None => Ok(ReleaseOutcome::Gone),
            },
            _ => Ok(ReleaseOutcome::Gone),
        }
    }

    async fn inspect(&self, check_id: Uuid) -> SchedulerResult<Option<Lease>> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn
            .get(Self::key(check_id))
            .await
            .map_err(|e| SchedulerError::Unavailable(format!("redis GET: {e}")))?;

        match raw {
            None => Ok(None),
            Some(s) => {
                let lease: Lease = serde_json::from_str(&s)
                    .map_err(|e| SchedulerError::internal(format!("parse lease: {e}")))?;
                Ok(Some(lease))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_naming_matches_redis_keys_contract() {
        let id = Uuid::nil();
        assert_eq!(RedisLeaseManager::key(id), format!("lock:check:{id}"));
    }
}
