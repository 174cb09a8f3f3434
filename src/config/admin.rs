//! Admin access configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Minimum admin token length accepted at startup.
const MIN_TOKEN_LENGTH: usize = 16;

/// Admin access configuration (shared-secret header)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminConfig {
    /// Shared secret expected in the x-admin-token header
    pub token: String,
}

impl AdminConfig {
    /// Validate admin configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.token.is_empty() {
            return Err(ValidationError::MissingRequired("ADMIN_TOKEN"));
        }
        if self.token.len() < MIN_TOKEN_LENGTH {
            return Err(ValidationError::AdminTokenTooShort);
        }
        Ok(())
    }
}
