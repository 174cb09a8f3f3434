//! Payment webhook configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Payment webhook configuration (Stripe-compatible signing)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentConfig {
    /// Webhook signing secret shared with the payment provider
    pub webhook_secret: String,
}

impl PaymentConfig {
    /// Validate payment configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("PAYMENT_WEBHOOK_SECRET"));
        }
        if !self.webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidWebhookSecret);
        }
        Ok(())
    }
}
