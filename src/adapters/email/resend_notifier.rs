//! Resend-backed implementation of KeyNotifier.
//!
//! Sends the issued key to its owner over the Resend email API. The
//! provisioner treats delivery as fire-and-forget, so failures here are
//! reported but never block issuance.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

use crate::domain::credential::KeySecret;
use crate::ports::{KeyNotifier, NotifyError};

const DEFAULT_API_BASE: &str = "https://api.resend.com";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    text: String,
}

/// Mails issued keys via Resend.
pub struct ResendNotifier {
    client: Client,
    api_key: SecretString,
    from: String,
    api_base: String,
}

impl ResendNotifier {
    /// Creates a notifier with the API key and the "From" header value.
    pub fn new(api_key: SecretString, from: impl Into<String>) -> Self {
        Self::with_api_base(api_key, from, DEFAULT_API_BASE)
    }

    /// Overrides the API endpoint. Used by tests pointing at a stub server.
    pub fn with_api_base(
        api_key: SecretString,
        from: impl Into<String>,
        api_base: impl Into<String>,
    ) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            api_key,
            from: from.into(),
            api_base: api_base.into(),
        }
    }
}

#[async_trait]
impl KeyNotifier for ResendNotifier {
    async fn deliver(&self, recipient: &str, secret: &KeySecret) -> Result<(), NotifyError> {
        let body = SendEmailRequest {
            from: &self.from,
            to: [recipient],
            subject: "Your API key",
            text: format!(
                "Thanks for subscribing!\n\nYour API key: {}\n\n\
                 Send it in the x-api-key header on every request.",
                secret.as_str()
            ),
        };

        let response = self
            .client
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Rejected {
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}
