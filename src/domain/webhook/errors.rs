//! Error types for provisioning webhook handling.
//!
//! Each variant maps to an HTTP status that drives the payment provider's
//! retry behavior: 4xx means the delivery is never retried, 200 acknowledges
//! it, 5xx asks the provider to redeliver.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur while verifying or processing a provisioning webhook.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Signature did not match the payload.
    #[error("invalid signature")]
    SignatureInvalid,

    /// Signed timestamp older than the tolerance window; likely a replay.
    #[error("signature timestamp too old")]
    SignatureStale,

    /// Signed timestamp in the future beyond clock skew tolerance.
    #[error("signature timestamp in the future")]
    TimestampInFuture,

    /// Signature header or payload structure could not be parsed.
    #[error("malformed payload: {0}")]
    PayloadMalformed(String),

    /// A field the provisioner needs is missing from the event.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// Event verified fine but is not one we act on. Acknowledged with 200.
    #[error("event ignored: {0}")]
    Ignored(String),

    /// The store was unavailable; the provider should redeliver.
    #[error("persistence unavailable: {0}")]
    PersistenceUnavailable(String),
}

impl WebhookError {
    /// True if the provider should retry delivering this event.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WebhookError::PersistenceUnavailable(_))
    }

    /// Maps the error to the response status for the webhook endpoint.
    pub fn status_code(&self) -> StatusCode {
        match self {
            // Untrusted input rejected before any state change.
            WebhookError::SignatureInvalid
            | WebhookError::SignatureStale
            | WebhookError::TimestampInFuture
            | WebhookError::PayloadMalformed(_)
            | WebhookError::MissingField(_) => StatusCode::BAD_REQUEST,

            // Acknowledged so the provider stops redelivering.
            WebhookError::Ignored(_) => StatusCode::OK,

            // Signals the provider to redeliver.
            WebhookError::PersistenceUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
