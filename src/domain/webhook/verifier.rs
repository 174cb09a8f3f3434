//! Provisioning webhook signature verification.
//!
//! The payment provider signs each notification with HMAC-SHA256 over
//! `"{timestamp}.{payload}"` and sends the result in a signature header of
//! the form `t=<unix>,v1=<hex>`. Verification runs before any JSON
//! deserialization of the payload and before any database access, and has
//! no side effects on failure.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;
use super::event::PaymentEvent;

/// Oldest acceptable signed timestamp (replay window), in seconds.
const MAX_EVENT_AGE_SECS: i64 = 300;

/// Allowed clock skew for timestamps ahead of us, in seconds.
const MAX_CLOCK_SKEW_SECS: i64 = 60;

/// Parsed components of the signature header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix timestamp the signature covers.
    pub timestamp: i64,
    /// HMAC-SHA256 signature bytes.
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parses a `t=<unix>,v1=<hex>` header value.
    ///
    /// Unknown `key=value` pairs are ignored for forward compatibility.
    ///
    /// # Errors
    ///
    /// `PayloadMalformed` if the header is not in the expected shape.
    pub fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp: Option<i64> = None;
        let mut signature: Option<Vec<u8>> = None;

        for part in header.split(',') {
            let (key, value) = part.split_once('=').ok_or_else(|| {
                WebhookError::PayloadMalformed("invalid signature header".to_string())
            })?;

            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| {
                        WebhookError::PayloadMalformed("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    signature = Some(hex::decode(value).map_err(|_| {
                        WebhookError::PayloadMalformed("invalid signature hex".to_string())
                    })?);
                }
                _ => {}
            }
        }

        let timestamp = timestamp
            .ok_or_else(|| WebhookError::PayloadMalformed("missing timestamp".to_string()))?;
        let signature = signature
            .ok_or_else(|| WebhookError::PayloadMalformed("missing signature".to_string()))?;

        Ok(SignatureHeader {
            timestamp,
            signature,
        })
    }
}

/// Verifies inbound provisioning notifications.
pub struct WebhookVerifier {
    secret: SecretString,
}

impl WebhookVerifier {
    /// Creates a verifier with the shared signing secret.
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Verifies the signature and parses the event.
    ///
    /// Steps: parse header, check the timestamp window, recompute the
    /// signature, compare in constant time, and only then deserialize the
    /// untrusted payload.
    ///
    /// # Errors
    ///
    /// - `SignatureInvalid` on mismatch
    /// - `SignatureStale` / `TimestampInFuture` outside the window
    /// - `PayloadMalformed` on header or JSON shape problems
    pub fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<PaymentEvent, WebhookError> {
        let header = SignatureHeader::parse(signature_header)?;

        self.validate_timestamp(header.timestamp)?;

        let expected = self.compute_signature(header.timestamp, payload);
        if !constant_time_compare(&expected, &header.signature) {
            return Err(WebhookError::SignatureInvalid);
        }

        let event: PaymentEvent = serde_json::from_slice(payload)
            .map_err(|e| WebhookError::PayloadMalformed(e.to_string()))?;

        Ok(event)
    }

    fn validate_timestamp(&self, timestamp: i64) -> Result<(), WebhookError> {
        let now = chrono::Utc::now().timestamp();
        let age = now - timestamp;

        if age > MAX_EVENT_AGE_SECS {
            return Err(WebhookError::SignatureStale);
        }
        if age < -MAX_CLOCK_SKEW_SECS {
            return Err(WebhookError::TimestampInFuture);
        }
        Ok(())
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Vec<u8> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .expect("HMAC accepts any key length");
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.finalize().into_bytes().to_vec()
    }
}

/// Constant-time byte slice comparison, resistant to timing attacks.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Signs a payload the way the provider would. Test fixture helper.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
