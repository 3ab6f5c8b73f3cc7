//! Result Reconciler: applies worker-reported `TaskResult`s
//! idempotently, emits derived events for incident management, and reaps
//! Tasks orphaned by a worker crash.

pub mod amqp_source;
pub mod engine;
pub mod source;
pub mod types;

pub use engine::{reconcile_result, run_orphan_sweep_loop, sweep_orphans};
pub use source::{ResultDelivery, ResultSource};
pub use types::{DerivedEvent, EventSink, RecordingEventSink};

use std::sync::Arc;

use beacon_db::TaskStore;
use tracing::warn;

/// Drains `source` until it returns an error or `stop` fires, applying each
/// result via `reconcile_result` and ack/nack-ing per the outcome.
pub async fn run_reconcile_loop(
    task_store: Arc<TaskStore>,
    event_sink: Arc<dyn EventSink>,
    mut source: Box<dyn ResultSource>,
    stop: Arc<tokio::sync::Notify>,
) {
    loop {
        let delivery = tokio::select! {
            delivery = source.next() => delivery,
            _ = stop.notified() => {
                tracing::info!("reconcile loop stopping");
                return;
            }
        };

        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                warn!(error = %e, "result source error, reconcile loop stopping");
                return;
            }
        };

        let result = delivery.result().clone();
        match reconcile_result(&task_store, event_sink.as_ref(), &result).await {
            Ok(()) => {
                if let Err(e) = delivery.ack().await {
                    warn!(error = %e, "failed to ack result delivery");
                }
            }
            Err(e) => {
                warn!(task_id = %result.task_id, error = %e, "reconcile failed, nacking for redelivery");
                if let Err(e) = delivery.nack().await {
                    warn!(error = %e, "failed to nack result delivery");
                }
            }
        }
    }
}
