//! Integration tests for webhook-driven key provisioning.
//!
//! These tests exercise the signed webhook endpoint end to end: signature
//! verification over the raw body, event deduplication, key issuance, and
//! delivery notification - all over in-memory adapters.

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::Utc;
use secrecy::SecretString;
use serde_json::json;
use tower::ServiceExt;

use keygate::adapters::http::{router, AppState};
use keygate::adapters::memory::{InMemoryApiKeyRepository, InMemoryProcessedEventStore};
use keygate::application::IssuancePolicy;
use keygate::domain::credential::KeySecret;
use keygate::domain::webhook::{sign_payload, WebhookVerifier};
use keygate::ports::{ApiKeyRepository, KeyNotifier, NotifyError};

const WEBHOOK_SECRET: &str = "whsec_integration_test";
const ADMIN_TOKEN: &str = "test-admin-token-0001";

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Notifier that records every delivery it is asked to make.
struct RecordingNotifier {
    deliveries: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    fn new() -> Self {
        Self {
            deliveries: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl KeyNotifier for RecordingNotifier {
    async fn deliver(&self, recipient: &str, secret: &KeySecret) -> Result<(), NotifyError> {
        self.deliveries
            .lock()
            .unwrap()
            .push((recipient.to_string(), secret.as_str().to_string()));
        Ok(())
    }
}

struct Fixture {
    state: AppState,
    keys: Arc<InMemoryApiKeyRepository>,
    events: Arc<InMemoryProcessedEventStore>,
    notifier: Arc<RecordingNotifier>,
}

fn fixture() -> Fixture {
    let keys = Arc::new(InMemoryApiKeyRepository::new());
    let events = Arc::new(InMemoryProcessedEventStore::new());
    let notifier = Arc::new(RecordingNotifier::new());
    let state = AppState {
        keys: keys.clone(),
        events: events.clone(),
        notifier: notifier.clone(),
        verifier: Arc::new(WebhookVerifier::new(SecretString::new(
            WEBHOOK_SECRET.to_string(),
        ))),
        policy: IssuancePolicy {
            request_limit: 100,
            ttl: Some(chrono::Duration::days(30)),
        },
        admin_token: SecretString::new(ADMIN_TOKEN.to_string()),
    };
    Fixture {
        state,
        keys,
        events,
        notifier,
    }
}

fn app(state: &AppState) -> axum::Router {
    router(state.clone(), StdDuration::from_secs(5), 10_000)
}

fn checkout_payload(event_id: &str, email: &str) -> String {
    json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "customer_email": email
            }
        }
    })
    .to_string()
}

fn signed_request(payload: &str) -> Request<Body> {
    let timestamp = Utc::now().timestamp();
    let signature = sign_payload(WEBHOOK_SECRET, timestamp, payload.as_bytes());
    Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("stripe-signature", format!("t={timestamp},v1={signature}"))
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

// =============================================================================
// Provisioning
// =============================================================================

#[tokio::test]
async fn signed_checkout_event_issues_a_key() {
    let fx = fixture();
    let payload = checkout_payload("evt_issue_1", "buyer@example.com");

    let response = app(&fx.state)
        .oneshot(signed_request(&payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["received"], true);

    let keys = fx.keys.list().await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].owner_email, "buyer@example.com");
    assert_eq!(keys[0].request_limit, 100);
    assert_eq!(keys[0].request_count, 0);
    assert!(keys[0].expires_at.is_some());

    let deliveries = fx.notifier.deliveries.lock().unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].0, "buyer@example.com");
    assert_eq!(deliveries[0].1, keys[0].secret.as_str());
}

#[tokio::test]
async fn replayed_event_does_not_issue_a_second_key() {
    let fx = fixture();
    let payload = checkout_payload("evt_replay", "buyer@example.com");
    let app = app(&fx.state);

    let first = app.clone().oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    let json = body_json(second).await;
    assert_eq!(json["received"], true);

    let keys = fx.keys.list().await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(fx.notifier.deliveries.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn tampered_payload_is_rejected_without_side_effects() {
    let fx = fixture();
    let payload = checkout_payload("evt_tamper", "buyer@example.com");

    let timestamp = Utc::now().timestamp();
    let signature = sign_payload(WEBHOOK_SECRET, timestamp, payload.as_bytes());
    let tampered = payload.replace("buyer@example.com", "attacker@example.com");

    let response = app(&fx.state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payment")
                .header("stripe-signature", format!("t={timestamp},v1={signature}"))
                .body(Body::from(tampered))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(fx.keys.list().await.unwrap().is_empty());
    assert!(fx.events.is_empty());
    assert!(fx.notifier.deliveries.lock().unwrap().is_empty());
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let fx = fixture();
    let payload = checkout_payload("evt_nosig", "buyer@example.com");

    let response = app(&fx.state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payment")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "missing signature header");
    assert!(fx.keys.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn stale_timestamp_is_rejected() {
    let fx = fixture();
    let payload = checkout_payload("evt_stale", "buyer@example.com");

    let timestamp = Utc::now().timestamp() - 600;
    let signature = sign_payload(WEBHOOK_SECRET, timestamp, payload.as_bytes());

    let response = app(&fx.state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhooks/payment")
                .header("stripe-signature", format!("t={timestamp},v1={signature}"))
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(fx.keys.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn unrelated_event_type_is_acknowledged_without_issuing() {
    let fx = fixture();
    let payload = json!({
        "id": "evt_other",
        "type": "invoice.paid",
        "created": Utc::now().timestamp(),
        "data": { "object": {} }
    })
    .to_string();

    let response = app(&fx.state)
        .oneshot(signed_request(&payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["received"], true);
    assert!(fx.keys.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn checkout_without_email_is_rejected() {
    let fx = fixture();
    let payload = json!({
        "id": "evt_noemail",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": { "object": {} }
    })
    .to_string();

    let response = app(&fx.state)
        .oneshot(signed_request(&payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(fx.keys.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn customer_details_email_is_used_as_fallback() {
    let fx = fixture();
    let payload = json!({
        "id": "evt_details",
        "type": "checkout.session.completed",
        "created": Utc::now().timestamp(),
        "data": {
            "object": {
                "customer_details": { "email": "fallback@example.com" }
            }
        }
    })
    .to_string();

    let response = app(&fx.state)
        .oneshot(signed_request(&payload))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let keys = fx.keys.list().await.unwrap();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].owner_email, "fallback@example.com");
}

// =============================================================================
// End to End
// =============================================================================

#[tokio::test]
async fn provisioned_key_admits_protected_requests() {
    let fx = fixture();
    let app = app(&fx.state);
    let payload = checkout_payload("evt_e2e", "buyer@example.com");

    let response = app.clone().oneshot(signed_request(&payload)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let secret = {
        let deliveries = fx.notifier.deliveries.lock().unwrap();
        deliveries[0].1.clone()
    };

    let response = app
        .oneshot(
            Request::builder()
                .uri("/protected")
                .header("x-api-key", &secret)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "access granted");
    assert_eq!(json["remaining"], 99);
}
