//! Per-client request rate limiting for the public routes.
//!
//! A sliding-window limiter keyed by client IP sits in front of every
//! route except the provisioning webhook; the payment provider retries on
//! its own schedule and must never be throttled. State is in-process, so
//! the bound applies per instance, which is enough to blunt abuse without
//! a shared store.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::{ConnectInfo, Request};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use tracing::warn;

use super::dto::ErrorBody;

/// Sliding-window request limiter, one window per client IP.
pub struct RateLimiter {
    max_requests: u32,
    window: Duration,
    windows: Mutex<HashMap<IpAddr, Vec<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Limiter admitting `max_requests` per client per minute.
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, Duration::from_secs(60))
    }

    /// Records one request from `ip` and reports whether it is admitted.
    ///
    /// Entries older than the window are pruned on the way; a refused
    /// request is not recorded, so being limited does not extend the wait.
    pub fn try_admit(&self, ip: IpAddr) -> bool {
        let now = Instant::now();
        let mut windows = self.windows.lock().unwrap();
        let timestamps = windows.entry(ip).or_default();
        timestamps.retain(|&t| now.duration_since(t) < self.window);
        if timestamps.len() >= self.max_requests as usize {
            return false;
        }
        timestamps.push(now);
        true
    }
}

/// Resolves the client address the limiter keys on.
///
/// Behind a reverse proxy the peer address is the proxy, so the forwarding
/// headers take precedence: first entry of `x-forwarded-for`, then
/// `x-real-ip`, then the connection's peer address.
fn client_ip(request: &Request, connect_info: Option<&ConnectInfo<SocketAddr>>) -> Option<IpAddr> {
    let from_headers = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .or_else(|| {
            request
                .headers()
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
        })
        .and_then(|v| v.trim().parse::<IpAddr>().ok());

    from_headers.or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip()))
}

/// Middleware enforcing the per-client request rate.
///
/// When no client address can be determined the request passes with a
/// warning; refusing it would take the service down for every client
/// behind a misbehaving proxy.
pub async fn rate_limit_middleware(
    connect_info: Option<ConnectInfo<SocketAddr>>,
    Extension(limiter): Extension<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = match client_ip(&request, connect_info.as_ref()) {
        Some(ip) => ip,
        None => {
            warn!("client address unknown, skipping rate limit");
            return next.run(request).await;
        }
    };

    if !limiter.try_admit(ip) {
        warn!(client = %ip, "request rate exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("too many requests")),
        )
            .into_response();
    }

    next.run(request).await
}
