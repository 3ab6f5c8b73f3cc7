//! Per-IP sliding-window request cap, independent of the core's error model
//!. Kept in-process rather than in Redis: the
//! limiter only needs to survive one process's uptime, and every replica
//! enforcing its own cap is a reasonable approximation of a shared one.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::client_ip::resolve;
use crate::state::AppState;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Default)]
pub struct RateLimiter {
    hits: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `ip` is still under the per-minute cap, recording
    /// this request either way.
    async fn allow(&self, ip: IpAddr, limit: u32) -> bool {
        let now = Instant::now();
        let mut hits = self.hits.lock().await;
        let entry = hits.entry(ip).or_default();
        while entry.front().is_some_and(|t| now.duration_since(*t) > WINDOW) {
            entry.pop_front();
        }
        if entry.len() as u32 >= limit {
            return false;
        }
        entry.push_back(now);
        true
    }
}

#[derive(Serialize)]
struct RateLimitedResponse {
    error: String,
    code: &'static str,
}

pub async fn enforce(
    State(state): State<Arc<AppState>>,
    ConnectInfo(peer): ConnectInfo<std::net::SocketAddr>,
    headers: HeaderMap,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    let limit = state.config.admin.rate_limit_per_minute;
    if limit == 0 {
        return next.run(request).await;
    }

    let ip = resolve(&state.config.admin, peer, &headers);
    if state.rate_limiter.allow(ip, limit).await {
        next.run(request).await
    } else {
        (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitedResponse {
                error: "rate limit exceeded".into(),
                code: "RESOURCE_EXHAUSTED",
            }),
        )
            .into_response()
    }
}
