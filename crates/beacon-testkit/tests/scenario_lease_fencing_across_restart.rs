//! Lease fencing across a restart: a dispatcher that
//! stops while holding a lease never gets to release it out from under a
//! successor, but the lease still frees itself at TTL so the next replica
//! can dispatch the Check normally.

use std::time::Duration;

use beacon_lease::{AcquireOutcome, LeaseManager, ReleaseOutcome};
use beacon_testkit::InMemoryLeaseManager;
use uuid::Uuid;

#[tokio::test]
async fn late_release_by_the_stopped_owner_cannot_clear_the_successors_lease() {
    let manager = InMemoryLeaseManager::new();
    let check_id = Uuid::new_v4();

    let AcquireOutcome::Acquired(_) = manager
        .try_acquire(check_id, "replica-a", Duration::from_millis(30))
        .await
        .unwrap()
    else {
        panic!("replica-a should win the free lease");
    };

    // replica-a "crashes" here: it never calls release(). A second replica
    // must see `busy` until the TTL elapses.
    assert_eq!(
        manager
            .try_acquire(check_id, "replica-b", Duration::from_secs(60))
            .await
            .unwrap(),
        AcquireOutcome::Busy
    );

    tokio::time::sleep(Duration::from_millis(50)).await;

    // TTL expired: a fresh replica now acquires normally (S6).
    let AcquireOutcome::Acquired(lease_b) = manager
        .try_acquire(check_id, "replica-b", Duration::from_secs(60))
        .await
        .unwrap()
    else {
        panic!("replica-b should acquire once replica-a's lease expires");
    };
    assert_eq!(lease_b.owner_id, "replica-b");

    // replica-a's belated release attempt must not be able to fence out
    // replica-b's now-live lease.
    assert_eq!(
        manager.release(check_id, "replica-a").await.unwrap(),
        ReleaseOutcome::NotOwner
    );
    assert!(manager.is_held(check_id).await.unwrap());

    assert_eq!(
        manager.release(check_id, "replica-b").await.unwrap(),
        ReleaseOutcome::Ok
    );
    assert!(!manager.is_held(check_id).await.unwrap());
}
