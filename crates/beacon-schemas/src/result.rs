use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskResultStatus {
    Completed,
    Failed,
}

impl TaskResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskResultStatus::Completed => "completed",
            TaskResultStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for TaskResultStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "completed" => Ok(TaskResultStatus::Completed),
            "failed" => Ok(TaskResultStatus::Failed),
            other => Err(format!("unknown task result status: {other}")),
        }
    }
}

/// Outcome published back by a worker for a single Task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub task_id: Uuid,
    pub check_id: Uuid,
    pub status: TaskResultStatus,
    pub error_message: Option<String>,
    pub duration_ms: i64,
    pub completed_at: DateTime<Utc>,
}
