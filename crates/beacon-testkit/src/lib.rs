//! Fixtures, a fake clock, and re-exported in-memory doubles for scenario
//! tests that exercise the Scheduler Core across crate boundaries.
//!
//! Each crate already owns the in-memory double for its own contract
//! (`beacon_lease::InMemoryLeaseManager`, `beacon_publisher::InMemoryPublisher`,
//! `beacon_reconciler::{InMemoryResultSource, RecordingEventSink}`) so unit
//! tests inside those crates don't need this one. `beacon-testkit` exists
//! for the layer above that: `tests/scenario_*.rs` files, one per
//! cross-crate correctness property, that wire a real `Dispatcher`/`TickLoop`/
//! reconcile loop against Postgres plus these in-memory doubles.

pub mod clock;
pub mod fixtures;

pub use beacon_lease::InMemoryLeaseManager;
pub use beacon_publisher::InMemoryPublisher;
pub use beacon_reconciler::{InMemoryResultSource, RecordingEventSink};
pub use clock::FakeClock;
