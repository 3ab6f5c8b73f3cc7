use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::ConfigMap;

/// Default task priority assigned when a Check's config carries no explicit
/// `priority` key.'s derived-priority supplement.
pub const DEFAULT_PRIORITY: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckType {
    Http,
    Https,
    Grpc,
    Graphql,
    Tcp,
}

impl CheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckType::Http => "http",
            CheckType::Https => "https",
            CheckType::Grpc => "grpc",
            CheckType::Graphql => "graphql",
            CheckType::Tcp => "tcp",
        }
    }
}

impl std::str::FromStr for CheckType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "http" => Ok(CheckType::Http),
            "https" => Ok(CheckType::Https),
            "grpc" => Ok(CheckType::Grpc),
            "graphql" => Ok(CheckType::Graphql),
            "tcp" => Ok(CheckType::Tcp),
            other => Err(format!("unknown check type: {other}")),
        }
    }
}

/// A single monitored target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Check {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    pub description: Option<String>,
    pub r#type: CheckType,
    pub target: String,
    pub config: ConfigMap,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}

impl Check {
    /// Task priority derived from `config.priority`, clamped into [1,4],
    /// defaulting to `DEFAULT_PRIORITY` when absent or out of range.
    pub fn task_priority(&self) -> i32 {
        self.config
            .int("priority")
            .unwrap_or(DEFAULT_PRIORITY)
            .clamp(1, 4) as i32
    }
}

/// Caller-supplied definition for `create_check` / `update_check`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCheck {
    pub name: String,
    pub description: Option<String>,
    pub r#type: CheckType,
    pub target: String,
    #[serde(default)]
    pub config: ConfigMap,
    pub interval_seconds: i32,
    pub timeout_seconds: i32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}
