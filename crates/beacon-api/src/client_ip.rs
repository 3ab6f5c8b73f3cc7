//! Client IP resolution for rate limiting.
//!
//! `X-Forwarded-For` is trusted only when the immediate peer address falls
//! inside `ADMIN_TRUSTED_PROXIES`; otherwise the socket peer address is used
//! and the header is ignored outright — a spoofed header from an untrusted
//! peer can never substitute for the real source.

use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;
use beacon_config::AdminConfig;

pub fn resolve(admin: &AdminConfig, peer: SocketAddr, headers: &HeaderMap) -> IpAddr {
    let peer_ip = peer.ip();
    if !admin.trusts(peer_ip) {
        return peer_ip;
    }

    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .and_then(|s| s.parse::<IpAddr>().ok())
        .unwrap_or(peer_ip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn admin(trusted: &[&str]) -> AdminConfig {
        AdminConfig {
            trusted_proxies: trusted.iter().map(|s| s.parse().unwrap()).collect(),
            bind_addr: "127.0.0.1:8899".into(),
            rate_limit_per_minute: 600,
        }
    }

    fn peer(s: &str) -> SocketAddr {
        s.parse().unwrap()
    }

    #[test]
    fn ignores_forwarded_header_from_untrusted_peer() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("9.9.9.9"));
        let ip = resolve(&admin(&[]), peer("203.0.113.5:443"), &headers);
        assert_eq!(ip, "203.0.113.5".parse::<IpAddr>().unwrap());
    }

    #[test]
    fn trusts_forwarded_header_from_configured_proxy() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("9.9.9.9, 10.0.0.1"));
        let ip = resolve(&admin(&["10.0.0.0/8"]), peer("10.0.0.7:443"), &headers);
        assert_eq!(ip, "9.9.9.9".parse::<IpAddr>().unwrap());
    }
}
