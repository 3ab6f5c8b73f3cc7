//! Task Publisher: topic-routed publish to the broker with publisher
//! confirms and bounded exponential-backoff retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use beacon_schemas::{SchedulerError, SchedulerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

pub mod amqp;

/// Small envelope handed to the broker: the Task plus the fields the worker
/// needs to execute it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskEnvelope {
    pub task_id: Uuid,
    pub check_id: Uuid,
    pub tenant_id: String,
    pub r#type: String,
    pub target: String,
    pub config: serde_json::Value,
    pub timeout_seconds: i32,
    pub scheduled_at: DateTime<Utc>,
    pub priority: i32,
}

impl TaskEnvelope {
    /// `task.{type}.{tenant_id}.{priority}`.
    pub fn routing_key(&self) -> String {
        format!("task.{}.{}.{}", self.r#type, self.tenant_id, self.priority)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
    pub attempts: u32,
    pub jitter_pct: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            attempts: 3,
            jitter_pct: 0.25,
        }
    }
}

impl RetryPolicy {
    /// `base * multiplier^(attempt-1)`, capped at `max_delay`, ±jitter_pct.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.base.as_secs_f64() * self.multiplier.powi(attempt as i32 - 1);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jitter = (rand::random::<f64>() * 2.0 - 1.0) * self.jitter_pct;
        let jittered = (capped * (1.0 + jitter)).max(0.0);
        Duration::from_secs_f64(jittered)
    }
}

#[async_trait]
pub trait TaskPublisher: Send + Sync {
    async fn publish(&self, envelope: &TaskEnvelope) -> SchedulerResult<()>;
}

/// In-memory double for tests and for the at-most-one-concurrent-dispatch
/// property suite, grounded on the corpus's `MockBroker` recording pattern.
#[derive(Clone, Default)]
pub struct InMemoryPublisher {
    published: Arc<Mutex<Vec<TaskEnvelope>>>,
    fail_next: Arc<Mutex<u32>>,
}

impl InMemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` publish attempts fail with `Unavailable`, to
    /// exercise retry/back-off and publish-failure paths deterministically.
    pub async fn fail_next_n(&self, n: u32) {
        *self.fail_next.lock().await = n;
    }

    pub async fn published(&self) -> Vec<TaskEnvelope> {
        self.published.lock().await.clone()
    }
}

#[async_trait]
impl TaskPublisher for InMemoryPublisher {
    async fn publish(&self, envelope: &TaskEnvelope) -> SchedulerResult<()> {
        let mut remaining = self.fail_next.lock().await;
        if *remaining > 0 {
            *remaining -= 1;
            return Err(SchedulerError::Unavailable(
                "in-memory publisher: injected failure".into(),
            ));
        }
        drop(remaining);
        self.published.lock().await.push(envelope.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_key_matches_topic_convention() {
        let env = TaskEnvelope {
            task_id: Uuid::nil(),
            check_id: Uuid::nil(),
            tenant_id: "acme".into(),
            r#type: "http".into(),
            target: "https://example.com/".into(),
            config: serde_json::json!({}),
            timeout_seconds: 10,
            scheduled_at: Utc::now(),
            priority: 2,
        };
        assert_eq!(env.routing_key(), "task.http.acme.2");
    }

    #[test]
    fn retry_delay_grows_exponentially_and_respects_cap() {
        let policy = RetryPolicy {
            jitter_pct: 0.0,
            ..RetryPolicy::default()
        };
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(4));
        // attempt 6 would be 32s uncapped, must clamp to max_delay (30s).
        assert_eq!(policy.delay_for_attempt(6), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn in_memory_publisher_records_published_envelopes() {
        let publisher = InMemoryPublisher::new();
        let env = TaskEnvelope {
            task_id: Uuid::new_v4(),
            check_id: Uuid::new_v4(),
            tenant_id: "acme".into(),
            r#type: "tcp".into(),
            target: "db:5432".into(),
            config: serde_json::json!({}),
            timeout_seconds: 5,
            scheduled_at: Utc::now(),
            priority: 3,
        };

        publisher.publish(&env).await.unwrap();
        assert_eq!(publisher.published().await, vec![env]);
    }

    #[tokio::test]
    async fn in_memory_publisher_injects_failures_on_demand() {
        let publisher = InMemoryPublisher::new();
        publisher.fail_next_n(2).await;

        let env = TaskEnvelope {
            task_id: Uuid::new_v4(),
            check_id: Uuid::new_v4(),
            tenant_id: "acme".into(),
            r#type: "tcp".into(),
            target: "db:5432".into(),
            config: serde_json::json!({}),
            timeout_seconds: 5,
            scheduled_at: Utc::now(),
            priority: 3,
        };

        assert!(publisher.publish(&env).await.is_err());
        assert!(publisher.publish(&env).await.is_err());
        assert!(publisher.publish(&env).await.is_ok());
        assert_eq!(publisher.published().await.len(), 1);
    }
}
