//! Axum router for the keygate API.
//!
//! # Routes
//!
//! ## Provisioning (no auth, signature verified)
//! - `POST /webhooks/payment` - signed provisioning notifications
//!
//! ## Protected (credential header, quota metered)
//! - `GET /protected` - the metered endpoint
//!
//! ## Admin (shared-secret header)
//! - `GET /admin/keys` - snapshot of every key
//! - `POST /admin/keys/:id/revoke` - one-way revoke
//!
//! ## Operational
//! - `GET /health` - liveness probe

use std::sync::Arc;
use std::time::Duration;

use axum::middleware;
use axum::routing::{get, post};
use axum::{Extension, Router};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{
    admin_list_keys, admin_revoke_key, health, payment_webhook, protected_access, AppState,
};
use super::rate_limit::{rate_limit_middleware, RateLimiter};

/// Builds the application router.
///
/// Every route except the webhook sits behind a per-client rate limit of
/// `rate_limit_per_minute` requests; the payment provider's retries must
/// not be throttled. The timeout layer bounds every request, so a stalled
/// store degrades to an error response instead of a hung connection.
pub fn router(state: AppState, request_timeout: Duration, rate_limit_per_minute: u32) -> Router {
    let limiter = Arc::new(RateLimiter::per_minute(rate_limit_per_minute));

    let limited = Router::new()
        .route("/health", get(health))
        .route("/protected", get(protected_access))
        .route("/admin/keys", get(admin_list_keys))
        .route("/admin/keys/:id/revoke", post(admin_revoke_key))
        .layer(middleware::from_fn(rate_limit_middleware))
        .layer(Extension(limiter));

    Router::new()
        .route("/webhooks/payment", post(payment_webhook))
        .merge(limited)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
