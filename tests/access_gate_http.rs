//! Integration tests for the metered access gate and admin endpoints.
//!
//! These tests drive the real router over in-memory adapters and verify
//! the full HTTP contract: status codes, error bodies, and the atomicity
//! of quota consumption under concurrent load.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use secrecy::SecretString;
use tower::ServiceExt;

use keygate::adapters::http::{router, AppState};
use keygate::adapters::memory::{InMemoryApiKeyRepository, InMemoryProcessedEventStore};
use keygate::application::IssuancePolicy;
use keygate::domain::credential::{ApiKey, KeySecret};
use keygate::domain::webhook::WebhookVerifier;
use keygate::ports::{ApiKeyRepository, KeyNotifier, NotifyError};

const ADMIN_TOKEN: &str = "test-admin-token-0001";

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Notifier that silently accepts every delivery.
struct NullNotifier;

#[async_trait]
impl KeyNotifier for NullNotifier {
    async fn deliver(&self, _recipient: &str, _secret: &KeySecret) -> Result<(), NotifyError> {
        Ok(())
    }
}

struct Fixture {
    state: AppState,
    keys: Arc<InMemoryApiKeyRepository>,
}

fn fixture() -> Fixture {
    let keys = Arc::new(InMemoryApiKeyRepository::new());
    let state = AppState {
        keys: keys.clone(),
        events: Arc::new(InMemoryProcessedEventStore::new()),
        notifier: Arc::new(NullNotifier),
        verifier: Arc::new(WebhookVerifier::new(SecretString::new(
            "whsec_test".to_string(),
        ))),
        policy: IssuancePolicy::default(),
        admin_token: SecretString::new(ADMIN_TOKEN.to_string()),
    };
    Fixture { state, keys }
}

fn app(state: &AppState) -> axum::Router {
    // Rate limit high enough that only the dedicated tests ever hit it.
    router(state.clone(), StdDuration::from_secs(5), 10_000)
}

fn throttled_app(state: &AppState, per_minute: u32) -> axum::Router {
    router(state.clone(), StdDuration::from_secs(5), per_minute)
}

async fn seed_key(keys: &InMemoryApiKeyRepository, limit: u32) -> ApiKey {
    let key = ApiKey::issue(
        KeySecret::generate(),
        "tenant@example.com",
        limit,
        Some(Duration::days(30)),
        format!("evt_{}", uuid::Uuid::new_v4()),
    )
    .unwrap();
    keys.insert(&key).await.unwrap();
    key
}

fn protected_request(header: &str, credential: &str) -> Request<Body> {
    Request::builder()
        .uri("/protected")
        .header(header, credential)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Access Gate
// =============================================================================

#[tokio::test]
async fn missing_credential_is_unauthorized() {
    let fx = fixture();

    let response = app(&fx.state)
        .oneshot(Request::builder().uri("/protected").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "credential required");
}

#[tokio::test]
async fn blank_credential_is_unauthorized() {
    let fx = fixture();

    let response = app(&fx.state)
        .oneshot(protected_request("x-api-key", "   "))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "credential required");
}

#[tokio::test]
async fn unknown_credential_is_unauthorized() {
    let fx = fixture();
    seed_key(&fx.keys, 10).await;

    let stranger = KeySecret::generate();
    let response = app(&fx.state)
        .oneshot(protected_request("x-api-key", stranger.as_str()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid credential");
}

#[tokio::test]
async fn malformed_credential_is_unauthorized() {
    let fx = fixture();

    let response = app(&fx.state)
        .oneshot(protected_request("x-api-key", "not-a-hex-key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "invalid credential");
}

#[tokio::test]
async fn valid_key_is_admitted_with_remaining() {
    let fx = fixture();
    let key = seed_key(&fx.keys, 10).await;

    let response = app(&fx.state)
        .oneshot(protected_request("x-api-key", key.secret.as_str()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "access granted");
    assert_eq!(json["remaining"], 9);
}

#[tokio::test]
async fn rapidapi_header_is_accepted() {
    let fx = fixture();
    let key = seed_key(&fx.keys, 10).await;

    let response = app(&fx.state)
        .oneshot(protected_request("x-rapidapi-key", key.secret.as_str()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn quota_exhaustion_returns_too_many_requests() {
    let fx = fixture();
    let key = seed_key(&fx.keys, 2).await;
    let app = app(&fx.state);

    for expected_remaining in [1, 0] {
        let response = app
            .clone()
            .oneshot(protected_request("x-api-key", key.secret.as_str()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["remaining"], expected_remaining);
    }

    let response = app
        .oneshot(protected_request("x-api-key", key.secret.as_str()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["error"], "quota exceeded");
}

#[tokio::test]
async fn revoked_key_is_forbidden() {
    let fx = fixture();
    let mut key = ApiKey::issue(
        KeySecret::generate(),
        "tenant@example.com",
        10,
        None,
        "evt_revoked",
    )
    .unwrap();
    key.revoke();
    fx.keys.insert(&key).await.unwrap();

    let response = app(&fx.state)
        .oneshot(protected_request("x-api-key", key.secret.as_str()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "revoked");
}

#[tokio::test]
async fn expired_key_is_forbidden() {
    let fx = fixture();
    let mut key = ApiKey::issue(
        KeySecret::generate(),
        "tenant@example.com",
        10,
        None,
        "evt_expired",
    )
    .unwrap();
    key.expires_at = Some(Utc::now() - Duration::hours(1));
    fx.keys.insert(&key).await.unwrap();

    let response = app(&fx.state)
        .oneshot(protected_request("x-api-key", key.secret.as_str()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["error"], "expired");
}

#[tokio::test]
async fn concurrent_requests_never_overspend_quota() {
    let fx = fixture();
    let key = seed_key(&fx.keys, 5).await;
    let app = app(&fx.state);

    let tasks: Vec<_> = (0..20)
        .map(|_| {
            let app = app.clone();
            let secret = key.secret.as_str().to_string();
            tokio::spawn(async move {
                app.oneshot(protected_request("x-api-key", &secret))
                    .await
                    .unwrap()
                    .status()
            })
        })
        .collect();

    let statuses = futures::future::join_all(tasks).await;
    let admitted = statuses
        .iter()
        .filter(|r| *r.as_ref().unwrap() == StatusCode::OK)
        .count();

    assert_eq!(admitted, 5);

    let stored = fx.keys.find_by_id(&key.id).await.unwrap().unwrap();
    assert_eq!(stored.request_count, 5);
}

// =============================================================================
// Request Rate Limit
// =============================================================================

fn forwarded_request(uri: &str, client: &str, credential: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).header("x-forwarded-for", client);
    if let Some(credential) = credential {
        builder = builder.header("x-api-key", credential);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn request_rate_above_limit_is_throttled() {
    let fx = fixture();
    let key = seed_key(&fx.keys, 100).await;
    let app = throttled_app(&fx.state, 3);

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(forwarded_request(
                "/protected",
                "203.0.113.5",
                Some(key.secret.as_str()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .oneshot(forwarded_request(
            "/protected",
            "203.0.113.5",
            Some(key.secret.as_str()),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json = body_json(response).await;
    assert_eq!(json["error"], "too many requests");

    // Throttling happened before the gate: no quota was spent on it.
    let stored = fx.keys.find_by_id(&key.id).await.unwrap().unwrap();
    assert_eq!(stored.request_count, 3);
}

#[tokio::test]
async fn rate_limit_is_per_client() {
    let fx = fixture();
    let key = seed_key(&fx.keys, 100).await;
    let app = throttled_app(&fx.state, 1);

    let first = app
        .clone()
        .oneshot(forwarded_request(
            "/protected",
            "203.0.113.5",
            Some(key.secret.as_str()),
        ))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let throttled = app
        .clone()
        .oneshot(forwarded_request(
            "/protected",
            "203.0.113.5",
            Some(key.secret.as_str()),
        ))
        .await
        .unwrap();
    assert_eq!(throttled.status(), StatusCode::TOO_MANY_REQUESTS);

    let other_client = app
        .oneshot(forwarded_request(
            "/protected",
            "203.0.113.6",
            Some(key.secret.as_str()),
        ))
        .await
        .unwrap();
    assert_eq!(other_client.status(), StatusCode::OK);
}

#[tokio::test]
async fn webhook_route_is_exempt_from_rate_limit() {
    let fx = fixture();
    let app = throttled_app(&fx.state, 1);

    // The provider retries on its own schedule; every delivery reaches the
    // signature check instead of being throttled.
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhooks/payment")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

// =============================================================================
// Admin Control
// =============================================================================

fn admin_list_request(token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri("/admin/keys");
    if let Some(token) = token {
        builder = builder.header("x-admin-token", token);
    }
    builder.body(Body::empty()).unwrap()
}

#[tokio::test]
async fn admin_list_requires_token() {
    let fx = fixture();

    let response = app(&fx.state)
        .oneshot(admin_list_request(None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app(&fx.state)
        .oneshot(admin_list_request(Some("wrong-admin-token-00")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_list_returns_full_snapshot() {
    let fx = fixture();
    let key = seed_key(&fx.keys, 10).await;

    let response = app(&fx.state)
        .oneshot(admin_list_request(Some(ADMIN_TOKEN)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let entries = json.as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["secret"], key.secret.as_str());
    assert_eq!(entries[0]["owner_email"], "tenant@example.com");
    assert_eq!(entries[0]["state"], "active");
}

#[tokio::test]
async fn admin_revoke_blocks_further_access() {
    let fx = fixture();
    let key = seed_key(&fx.keys, 10).await;

    let response = app(&fx.state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/keys/{}/revoke", key.id))
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["revoked"], true);

    let response = app(&fx.state)
        .oneshot(protected_request("x-api-key", key.secret.as_str()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_revoke_unknown_key_is_not_found() {
    let fx = fixture();

    let response = app(&fx.state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/admin/keys/{}/revoke", uuid::Uuid::new_v4()))
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_json(response).await;
    assert_eq!(json["error"], "key not found");
}

#[tokio::test]
async fn admin_revoke_invalid_id_is_bad_request() {
    let fx = fixture();

    let response = app(&fx.state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/admin/keys/not-a-uuid/revoke")
                .header("x-admin-token", ADMIN_TOKEN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Operational
// =============================================================================

#[tokio::test]
async fn health_endpoint_responds() {
    let fx = fixture();

    let response = app(&fx.state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}
