//! Admin operations: snapshot listing and one-way revocation.
//!
//! Thin by design; authentication (the constant-time shared-secret check)
//! lives in the HTTP adapter, these handlers only touch the store.

use std::sync::Arc;

use tracing::info;

use crate::domain::credential::ApiKey;
use crate::domain::foundation::{ApiKeyId, DomainError};
use crate::ports::ApiKeyRepository;

/// Lists every key, including secrets.
///
/// The snapshot is the out-of-band recovery path for keys whose
/// notification delivery failed.
pub struct ListKeysHandler {
    keys: Arc<dyn ApiKeyRepository>,
}

impl ListKeysHandler {
    pub fn new(keys: Arc<dyn ApiKeyRepository>) -> Self {
        Self { keys }
    }

    pub async fn handle(&self) -> Result<Vec<ApiKey>, DomainError> {
        self.keys.list().await
    }
}

/// Revokes a key by id.
pub struct RevokeKeyHandler {
    keys: Arc<dyn ApiKeyRepository>,
}

impl RevokeKeyHandler {
    pub fn new(keys: Arc<dyn ApiKeyRepository>) -> Self {
        Self { keys }
    }

    /// Returns true if the key existed. Revoking twice is a no-op.
    pub async fn handle(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        let revoked = self.keys.revoke(id).await?;
        if revoked {
            info!(key_id = %id, "api key revoked");
        }
        Ok(revoked)
    }
}
