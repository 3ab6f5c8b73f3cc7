//! Graceful stop: `stop()` completes within `shutdown_timeout`, and no
//! new dispatches start once it has been called.

use std::sync::Arc;
use std::time::Duration;

use beacon_db::{CheckStore, ScheduleStore, TaskStore};
use beacon_dispatch::{Dispatcher, TickLoop};
use beacon_index::ScheduleIndex;
use beacon_testkit::{fixtures, InMemoryLeaseManager, InMemoryPublisher};

#[tokio::test]
async fn stop_returns_promptly_and_blocks_further_dispatch() {
    let Some(pool) = fixtures::test_pool().await else {
        return;
    };

    let check_store = Arc::new(CheckStore::new(pool.clone()));
    let schedule_store = Arc::new(ScheduleStore::new(pool.clone()));
    let task_store = Arc::new(TaskStore::new(pool));
    let index = Arc::new(ScheduleIndex::new());

    let check = check_store
        .create_check("acme", fixtures::http_check("stop-target", 5))
        .await
        .unwrap();
    index
        .upsert(check.id, check.next_run_at.unwrap(), check.task_priority())
        .await;

    let publisher_handle = Arc::new(InMemoryPublisher::new());
    let dispatcher = Arc::new(Dispatcher {
        owner_id: "solo".into(),
        check_store: Arc::clone(&check_store),
        schedule_store: Arc::clone(&schedule_store),
        task_store: Arc::clone(&task_store),
        lease_manager: Arc::new(InMemoryLeaseManager::new()),
        publisher: publisher_handle.clone(),
        index: Arc::clone(&index),
        lease_ttl: Duration::from_secs(300),
    });

    let tick_loop = Arc::new(TickLoop::new(
        Arc::clone(&dispatcher),
        Arc::clone(&index),
        Duration::from_millis(50),
        10,
        Duration::from_secs(2),
    ));
    assert!(!tick_loop.is_running());

    // Starting an already-running loop is a no-op.
    tick_loop.start();
    tick_loop.start();
    assert!(tick_loop.is_running());

    let due_now = chrono::Utc::now() - chrono::Duration::seconds(1);
    check_store.set_next_run(check.id, Some(due_now)).await.unwrap();
    index.upsert(check.id, due_now, check.task_priority()).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        !publisher_handle.published().await.is_empty(),
        "at least one dispatch should have happened before stop"
    );

    let stop_started = std::time::Instant::now();
    tick_loop.stop().await;
    assert!(
        stop_started.elapsed() < Duration::from_secs(2),
        "stop() must return within shutdown_timeout"
    );
    assert!(!tick_loop.is_running());

    let published_at_stop = publisher_handle.published().await.len();

    // The check is due again in both the Store and the Index, but the
    // stopped loop must not pick it up.
    let due_again = chrono::Utc::now() - chrono::Duration::seconds(1);
    check_store.set_next_run(check.id, Some(due_again)).await.unwrap();
    index.upsert(check.id, due_again, check.task_priority()).await;
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(
        publisher_handle.published().await.len(),
        published_at_stop,
        "no new dispatches may start after stop()"
    );
}
