//! HTTP handlers connecting axum routes to the application layer.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use secrecy::{ExposeSecret, SecretString};
use subtle::ConstantTimeEq;

use crate::application::{
    AccessDecision, ConsumeAccessHandler, IssuancePolicy, ListKeysHandler, ProvisionKeyHandler,
    RevokeKeyHandler,
};
use crate::domain::foundation::ApiKeyId;
use crate::domain::webhook::{WebhookError, WebhookVerifier};
use crate::ports::{ApiKeyRepository, DenyReason, KeyNotifier, ProcessedEventStore};

use super::dto::{AccessGrantedBody, ErrorBody, KeySummary, RevokeBody, WebhookAckBody};

/// Header carrying the provisioning signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Credential headers accepted on protected routes; first non-empty wins.
pub const CREDENTIAL_HEADERS: [&str; 2] = ["x-api-key", "x-rapidapi-key"];

/// Header carrying the admin shared secret.
pub const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Shared application state; Arc-wrapped dependencies cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub keys: Arc<dyn ApiKeyRepository>,
    pub events: Arc<dyn ProcessedEventStore>,
    pub notifier: Arc<dyn KeyNotifier>,
    pub verifier: Arc<WebhookVerifier>,
    pub policy: IssuancePolicy,
    pub admin_token: SecretString,
}

impl AppState {
    fn provision_handler(&self) -> ProvisionKeyHandler {
        ProvisionKeyHandler::new(
            self.events.clone(),
            self.keys.clone(),
            self.notifier.clone(),
            self.policy,
        )
    }

    fn access_handler(&self) -> ConsumeAccessHandler {
        ConsumeAccessHandler::new(self.keys.clone())
    }

    fn list_handler(&self) -> ListKeysHandler {
        ListKeysHandler::new(self.keys.clone())
    }

    fn revoke_handler(&self) -> RevokeKeyHandler {
        RevokeKeyHandler::new(self.keys.clone())
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Provisioning Webhook
// ════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/payment - verified provisioning notifications.
///
/// The body arrives as raw bytes: the signature covers the exact payload,
/// so nothing may deserialize it before verification.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = match headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) => value,
        None => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("missing signature header")),
            )
                .into_response();
        }
    };

    let event = match state.verifier.verify_and_parse(&body, signature) {
        Ok(event) => event,
        Err(e) => return webhook_error_response(e),
    };

    match state.provision_handler().handle(&event).await {
        Ok(_) => (StatusCode::OK, Json(WebhookAckBody { received: true })).into_response(),
        Err(e) => webhook_error_response(e),
    }
}

fn webhook_error_response(error: WebhookError) -> Response {
    // Ignored events are acknowledged so the provider stops redelivering.
    if matches!(error, WebhookError::Ignored(_)) {
        return (StatusCode::OK, Json(WebhookAckBody { received: true })).into_response();
    }

    let status = error.status_code();
    let body = if status.is_server_error() {
        // Generic category only; store detail stays in the logs.
        ErrorBody::new("persistence unavailable")
    } else {
        ErrorBody::new(error.to_string())
    };
    (status, Json(body)).into_response()
}

// ════════════════════════════════════════════════════════════════════════════
// Protected Access
// ════════════════════════════════════════════════════════════════════════════

/// GET /protected - the metered endpoint guarded by the quota gate.
pub async fn protected_access(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let credential = CREDENTIAL_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name).and_then(|v| v.to_str().ok()))
        .find(|value| !value.trim().is_empty());

    let decision = match state.access_handler().handle(credential).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::error!(error = %e, "access gate store failure");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("service unavailable")),
            )
                .into_response();
        }
    };

    match decision {
        AccessDecision::Admitted { remaining } => (
            StatusCode::OK,
            Json(AccessGrantedBody {
                message: "access granted".to_string(),
                remaining: Some(remaining),
            }),
        )
            .into_response(),
        AccessDecision::MissingCredential => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("credential required")),
        )
            .into_response(),
        AccessDecision::Refused(DenyReason::NotFound) => (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody::new("invalid credential")),
        )
            .into_response(),
        AccessDecision::Refused(DenyReason::Revoked) => {
            (StatusCode::FORBIDDEN, Json(ErrorBody::new("revoked"))).into_response()
        }
        AccessDecision::Refused(DenyReason::Expired) => {
            (StatusCode::FORBIDDEN, Json(ErrorBody::new("expired"))).into_response()
        }
        AccessDecision::Refused(DenyReason::QuotaExceeded) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorBody::new("quota exceeded")),
        )
            .into_response(),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Admin Control
// ════════════════════════════════════════════════════════════════════════════

/// Compares the presented admin token against the configured one in
/// constant time.
fn admin_authorized(headers: &HeaderMap, expected: &SecretString) -> bool {
    let presented = match headers.get(ADMIN_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        Some(value) => value.as_bytes(),
        None => return false,
    };
    let expected = expected.expose_secret().as_bytes();
    presented.len() == expected.len() && bool::from(presented.ct_eq(expected))
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorBody::new("unauthorized")),
    )
        .into_response()
}

/// GET /admin/keys - full snapshot of every key.
pub async fn admin_list_keys(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if !admin_authorized(&headers, &state.admin_token) {
        return unauthorized();
    }

    match state.list_handler().handle().await {
        Ok(keys) => {
            let summaries: Vec<KeySummary> = keys.iter().map(KeySummary::from).collect();
            (StatusCode::OK, Json(summaries)).into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "admin key listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("service unavailable")),
            )
                .into_response()
        }
    }
}

/// POST /admin/keys/:id/revoke - one-way revocation.
pub async fn admin_revoke_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if !admin_authorized(&headers, &state.admin_token) {
        return unauthorized();
    }

    let id = match ApiKeyId::parse(&id) {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody::new("invalid key id")),
            )
                .into_response();
        }
    };

    match state.revoke_handler().handle(&id).await {
        Ok(true) => (StatusCode::OK, Json(RevokeBody { revoked: true })).into_response(),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody::new("key not found")),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "revoke failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorBody::new("service unavailable")),
            )
                .into_response()
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Health
// ════════════════════════════════════════════════════════════════════════════

/// GET /health - liveness probe.
pub async fn health() -> Response {
    Json(serde_json::json!({ "status": "ok" })).into_response()
}
