//! HTTP DTOs for the keygate API.
//!
//! These types define the JSON bodies at the HTTP boundary. The error body
//! is deliberately terse: store-layer detail never leaves the process.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::domain::credential::ApiKey;

/// Generic error body: `{"error": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Body for an admitted protected request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessGrantedBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining: Option<u32>,
}

/// Acknowledgment body for the provisioning webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookAckBody {
    pub received: bool,
}

/// Result body for the admin revoke endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokeBody {
    pub revoked: bool,
}

/// One key in the admin snapshot.
///
/// Includes the secret: the snapshot is the out-of-band recovery path for
/// keys whose notification delivery failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeySummary {
    pub id: String,
    pub secret: String,
    pub owner_email: String,
    pub issued_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    pub request_count: u32,
    pub request_limit: u32,
    pub revoked: bool,
    pub state: String,
}

impl From<&ApiKey> for KeySummary {
    fn from(key: &ApiKey) -> Self {
        Self {
            id: key.id.to_string(),
            secret: key.secret.as_str().to_string(),
            owner_email: key.owner_email.clone(),
            issued_at: key.issued_at.to_rfc3339(),
            expires_at: key.expires_at.map(|at| at.to_rfc3339()),
            request_count: key.request_count,
            request_limit: key.request_limit,
            revoked: key.revoked,
            state: key.state(Utc::now()).as_str().to_string(),
        }
    }
}
