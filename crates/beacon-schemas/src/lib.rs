//! Shared data model and error contract for the Scheduler Core.
//!
//! Every crate in this workspace that crosses a component boundary (Check
//! Store, Lease Manager, Dispatcher, Publisher, Reconciler, Admin API) speaks
//! these types. Keeping them in one leaf crate is what lets `beacon-db` and
//! `beacon-api` agree on `Check` without a cyclic dependency.

pub mod check;
pub mod config;
pub mod error;
pub mod lease;
pub mod result;
pub mod schedule;
pub mod task;

pub use check::{Check, CheckType, NewCheck};
pub use config::ConfigMap;
pub use error::{SchedulerError, SchedulerResult};
pub use lease::Lease;
pub use result::{TaskResult, TaskResultStatus};
pub use schedule::{NewSchedule, Schedule};
pub use task::{Priority, Task, TaskStatus};
