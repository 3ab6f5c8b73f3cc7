//! Where `TaskResult`s come from: the `scheduler.results` queue bound to the
//! `checks.results` exchange in production, or an in-memory channel for
//! tests. Mirrors `beacon-publisher`'s trait-plus-adapter split so the
//! Reconciler never depends on `lapin` directly in its core logic.

use async_trait::async_trait;
use beacon_schemas::{SchedulerError, SchedulerResult, TaskResult};
use tokio::sync::mpsc;

/// A single delivery pulled off the result queue. `ack`/`nack` map directly
/// onto the broker's acknowledgement semantics: `nack` requeues so a
/// transient DB failure gets a redelivery rather than silently dropping the
/// result.
#[async_trait]
pub trait ResultDelivery: Send {
    fn result(&self) -> &TaskResult;
    async fn ack(self: Box<Self>) -> SchedulerResult<()>;
    async fn nack(self: Box<Self>) -> SchedulerResult<()>;
}

#[async_trait]
pub trait ResultSource: Send + Sync {
    async fn next(&mut self) -> SchedulerResult<Box<dyn ResultDelivery>>;
}

/// In-memory double: a channel of pre-decoded results, auto-acked. Used by
/// the idempotency and orphan-sweep scenario tests.
pub struct InMemoryDelivery {
    result: TaskResult,
}

#[async_trait]
impl ResultDelivery for InMemoryDelivery {
    fn result(&self) -> &TaskResult {
        &self.result
    }

    async fn ack(self: Box<Self>) -> SchedulerResult<()> {
        Ok(())
    }

    async fn nack(self: Box<Self>) -> SchedulerResult<()> {
        Ok(())
    }
}

pub struct InMemoryResultSource {
    rx: mpsc::UnboundedReceiver<TaskResult>,
}

pub struct InMemoryResultSender {
    tx: mpsc::UnboundedSender<TaskResult>,
}

impl InMemoryResultSender {
    pub fn send(&self, result: TaskResult) {
        let _ = self.tx.send(result);
    }
}

impl InMemoryResultSource {
    pub fn channel() -> (InMemoryResultSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (InMemoryResultSender { tx }, Self { rx })
    }
}

#[async_trait]
impl ResultSource for InMemoryResultSource {
    async fn next(&mut self) -> SchedulerResult<Box<dyn ResultDelivery>> {
        let result = self
            .rx
            .recv()
            .await
            .ok_or_else(|| SchedulerError::internal("result channel closed"))?;
        Ok(Box::new(InMemoryDelivery { result }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn in_memory_source_delivers_in_order() {
        let (sender, mut source) = InMemoryResultSource::channel();
        let result = TaskResult {
            task_id: Uuid::new_v4(),
            check_id: Uuid::new_v4(),
            status: beacon_schemas::TaskResultStatus::Completed,
            error_message: None,
            duration_ms: 42,
            completed_at: Utc::now(),
        };
        sender.send(result.clone());

        let delivery = source.next().await.unwrap();
        assert_eq!(delivery.result().task_id, result.task_id);
        delivery.ack().await.unwrap();
    }
}
