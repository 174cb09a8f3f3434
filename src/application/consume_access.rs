//! Access gate: resolve the presented credential and consume quota.
//!
//! The gate itself never separates the state check from the increment;
//! both happen inside the repository's atomic `try_consume`.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::domain::credential::KeySecret;
use crate::domain::foundation::DomainError;
use crate::ports::{ApiKeyRepository, ConsumeOutcome, DenyReason};

/// Decision for one protected request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    /// Quota consumed; the request proceeds.
    Admitted { remaining: u32 },
    /// The credential exists in some denied state, or does not exist.
    Refused(DenyReason),
    /// No credential header was presented.
    MissingCredential,
}

/// Gate evaluated on every protected request.
pub struct ConsumeAccessHandler {
    keys: Arc<dyn ApiKeyRepository>,
}

impl ConsumeAccessHandler {
    pub fn new(keys: Arc<dyn ApiKeyRepository>) -> Self {
        Self { keys }
    }

    /// Decides one request given the raw credential header value, if any.
    ///
    /// A syntactically invalid credential is refused as `NotFound` without
    /// touching the store; it cannot name an existing key.
    ///
    /// # Errors
    ///
    /// Propagates store failures; callers surface those as a generic 500.
    pub async fn handle(&self, credential: Option<&str>) -> Result<AccessDecision, DomainError> {
        let raw = match credential {
            Some(value) if !value.trim().is_empty() => value.trim(),
            _ => return Ok(AccessDecision::MissingCredential),
        };

        let secret = match KeySecret::parse(raw) {
            Ok(secret) => secret,
            Err(_) => return Ok(AccessDecision::Refused(DenyReason::NotFound)),
        };

        match self.keys.try_consume(&secret, Utc::now()).await? {
            ConsumeOutcome::Admitted { key_id, remaining } => {
                // Log the id, never the secret.
                info!(key_id = %key_id, remaining, "request admitted");
                Ok(AccessDecision::Admitted { remaining })
            }
            ConsumeOutcome::Denied(reason) => Ok(AccessDecision::Refused(reason)),
        }
    }
}
