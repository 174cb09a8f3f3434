//! Key issuance configuration

use serde::Deserialize;

use super::error::ValidationError;
use crate::application::IssuancePolicy;

/// Key issuance configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IssuanceConfig {
    /// Request quota granted to each newly issued key
    #[serde(default = "default_request_limit")]
    pub default_request_limit: u32,

    /// Key lifetime in days; absent means keys never expire
    #[serde(default = "default_key_ttl_days")]
    pub key_ttl_days: Option<i64>,
}

impl IssuanceConfig {
    /// Build the issuance policy applied by the provisioning handler
    pub fn policy(&self) -> IssuancePolicy {
        IssuancePolicy {
            request_limit: self.default_request_limit,
            ttl: self.key_ttl_days.map(chrono::Duration::days),
        }
    }

    /// Validate issuance configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.default_request_limit == 0 {
            return Err(ValidationError::InvalidRequestLimit);
        }
        if matches!(self.key_ttl_days, Some(days) if days <= 0) {
            return Err(ValidationError::InvalidRequestLimit);
        }
        Ok(())
    }
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            default_request_limit: default_request_limit(),
            key_ttl_days: default_key_ttl_days(),
        }
    }
}

fn default_request_limit() -> u32 {
    1000
}

fn default_key_ttl_days() -> Option<i64> {
    Some(30)
}
