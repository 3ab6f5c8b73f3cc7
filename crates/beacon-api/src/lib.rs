//! beacon-api library target.
//!
//! Exposes the router and state for integration tests. The binary `main.rs`
//! depends on this library target.

pub mod api_types;
pub mod client_ip;
pub mod rate_limit;
pub mod routes;
pub mod state;
