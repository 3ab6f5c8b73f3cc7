use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An exclusive, time-bounded hold on a check's execution slot.
///
/// Leases live only in Redis; this struct is the deserialized view of the
/// JSON blob stored at `lock:check:{check_id}`. Process memory never caches
/// leases across ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub check_id: Uuid,
    pub owner_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Lease {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
