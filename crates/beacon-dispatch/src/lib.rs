//! Tick Loop + Dispatcher: the cadence driver and the
//! per-check dispatch algorithm it feeds.

pub mod dispatcher;
pub mod tick_loop;

pub use dispatcher::{Dispatcher, DispatchOutcome};
pub use tick_loop::TickLoop;
