//! Provisioning notification event types.
//!
//! The payment provider posts a JSON event envelope; only the fields the
//! provisioner acts on are captured, the rest of the payload is ignored.

use serde::{Deserialize, Serialize};

use super::errors::WebhookError;

/// Event type strings we recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentEventType {
    /// A checkout completed; the only type that provisions a key.
    CheckoutSessionCompleted,
    /// Anything else. Acknowledged and ignored.
    Unknown,
}

impl PaymentEventType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "checkout.session.completed" => Self::CheckoutSessionCompleted,
            _ => Self::Unknown,
        }
    }
}

/// Verified provisioning notification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentEvent {
    /// Provider-assigned event identifier, the idempotency key.
    pub id: String,

    /// Event type string (e.g. "checkout.session.completed").
    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix timestamp at which the provider created the event.
    pub created: i64,

    /// Event-specific payload.
    pub data: PaymentEventData,
}

/// Container for the polymorphic event payload.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PaymentEventData {
    pub object: serde_json::Value,
}

/// The slice of a checkout session the provisioner needs.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Email supplied at checkout creation.
    #[serde(default)]
    pub customer_email: Option<String>,

    /// Details collected during checkout; newer payloads carry the email here.
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

impl PaymentEvent {
    /// Parses the event type string into a known variant.
    pub fn parsed_type(&self) -> PaymentEventType {
        PaymentEventType::from_str(&self.event_type)
    }

    /// Extracts the owner identity from a checkout session payload.
    ///
    /// Prefers `customer_email`, falls back to `customer_details.email`.
    ///
    /// # Errors
    ///
    /// `PayloadMalformed` if the object is not a checkout session,
    /// `MissingField` if no email is present in either location.
    pub fn owner_email(&self) -> Result<String, WebhookError> {
        let session: CheckoutSession = serde_json::from_value(self.data.object.clone())
            .map_err(|e| WebhookError::PayloadMalformed(e.to_string()))?;

        session
            .customer_email
            .or_else(|| session.customer_details.and_then(|d| d.email))
            .filter(|email| !email.trim().is_empty())
            .ok_or(WebhookError::MissingField("customer_email"))
    }
}
