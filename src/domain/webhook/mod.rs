//! Webhook domain: signature verification and the provisioning event model.

mod errors;
mod event;
mod verifier;

pub use errors::WebhookError;
pub use event::{CheckoutSession, CustomerDetails, PaymentEvent, PaymentEventData, PaymentEventType};
pub use verifier::{sign_payload, SignatureHeader, WebhookVerifier};
