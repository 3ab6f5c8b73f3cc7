//! Tick Loop: a 1-second cadence driver that feeds due checks into
//! the Dispatcher, cooperative and non-blocking with bounded concurrency.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use beacon_index::ScheduleIndex;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::dispatcher::Dispatcher;

pub struct TickLoop {
    dispatcher: Arc<Dispatcher>,
    index: Arc<ScheduleIndex>,
    tick_interval: Duration,
    max_concurrent_tasks: usize,
    shutdown_timeout: Duration,
    running: Arc<AtomicBool>,
    stop: Arc<tokio::sync::Notify>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl TickLoop {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        index: Arc<ScheduleIndex>,
        tick_interval: Duration,
        max_concurrent_tasks: usize,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            index,
            tick_interval,
            max_concurrent_tasks,
            shutdown_timeout,
            running: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(tokio::sync::Notify::new()),
            handle: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Starting an already-running loop is a no-op.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run().await });
        *self.handle.lock().unwrap() = Some(handle);
    }

    /// Cancels the loop and waits for in-flight dispatches up to
    /// `shutdown_timeout` before returning. By the time this returns, no new
    /// dispatches will start and every dispatch that was in flight has
    /// either completed or been abandoned by the run task's own drain
    /// timeout.
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.stop.notify_waiters();

        let handle = self.handle.lock().unwrap().take();
        let Some(handle) = handle else { return };

        // The run task bounds its own drain to shutdown_timeout; this outer
        // timeout is only a backstop against the join itself hanging.
        match tokio::time::timeout(self.shutdown_timeout + Duration::from_secs(1), handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "tick loop task panicked during shutdown"),
            Err(_) => warn!("tick loop did not exit within shutdown_timeout"),
        }
    }

    async fn run(self: Arc<Self>) {
        info!("tick loop starting");
        let semaphore = Arc::new(Semaphore::new(self.max_concurrent_tasks));
        let mut ticker = tokio::time::interval(self.tick_interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop.notified() => break,
            }

            if !self.running.load(Ordering::SeqCst) {
                break;
            }

            let due = self
                .index
                .due_before(chrono::Utc::now(), self.max_concurrent_tasks)
                .await;

            for check_id in due {
                let Ok(permit) = semaphore.clone().try_acquire_owned() else {
                    // Worker pool saturated this tick; the check stays due
                    // and will be picked up on a future tick.
                    break;
                };
                let dispatcher = Arc::clone(&self.dispatcher);
                tokio::spawn(async move {
                    let _permit = permit;
                    dispatcher.dispatch_one(check_id).await;
                });
            }
        }

        // Drain in-flight dispatches by acquiring every permit back.
        let drain = tokio::time::timeout(
            self.shutdown_timeout,
            semaphore.acquire_many(self.max_concurrent_tasks as u32),
        )
        .await;
        if drain.is_err() {
            warn!("tick loop shutdown_timeout elapsed with dispatches still in flight");
        }
        info!("tick loop stopped");
    }
}
