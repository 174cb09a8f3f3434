//! Provisioning pipeline: verified event in, exactly one key out.
//!
//! Steps, each a distinct failure domain:
//! 1. Deduplicate the event id; a replay is acknowledged without issuing.
//! 2. Generate the secret from the OS CSPRNG.
//! 3. Persist the key. Failure here is retryable: the dedup mark is
//!    forgotten (best effort) so the provider's redelivery can try again,
//!    and the unique `provisioning_event_id` column backstops any race.
//! 4. Hand the secret to the notifier. Fire-and-forget: delivery failure is
//!    logged and never rolls back the issued key.

use std::sync::Arc;

use chrono::Duration;
use tracing::{info, warn};

use crate::domain::credential::{ApiKey, KeySecret};
use crate::domain::foundation::{ApiKeyId, ErrorCode};
use crate::domain::webhook::{PaymentEvent, PaymentEventType, WebhookError};
use crate::ports::{ApiKeyRepository, KeyNotifier, MarkOutcome, ProcessedEventStore};

/// Issuance policy applied to every new key.
#[derive(Debug, Clone, Copy)]
pub struct IssuancePolicy {
    /// Request quota assigned at issuance.
    pub request_limit: u32,
    /// Key lifetime; `None` issues non-expiring keys.
    pub ttl: Option<Duration>,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            request_limit: 1000,
            ttl: Some(Duration::days(30)),
        }
    }
}

/// Outcome of handling a verified provisioning event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// A new key was issued.
    Issued { key_id: ApiKeyId },
    /// The event was processed before; nothing was issued.
    AlreadyProcessed,
}

/// Handles verified "checkout completed" events.
pub struct ProvisionKeyHandler {
    events: Arc<dyn ProcessedEventStore>,
    keys: Arc<dyn ApiKeyRepository>,
    notifier: Arc<dyn KeyNotifier>,
    policy: IssuancePolicy,
}

impl ProvisionKeyHandler {
    pub fn new(
        events: Arc<dyn ProcessedEventStore>,
        keys: Arc<dyn ApiKeyRepository>,
        notifier: Arc<dyn KeyNotifier>,
        policy: IssuancePolicy,
    ) -> Self {
        Self {
            events,
            keys,
            notifier,
            policy,
        }
    }

    /// Processes one verified event.
    ///
    /// # Errors
    ///
    /// - `Ignored` for event types that do not provision (acknowledged 200)
    /// - `MissingField` / `PayloadMalformed` when the session is unusable
    /// - `PersistenceUnavailable` when the store fails (provider retries)
    pub async fn handle(&self, event: &PaymentEvent) -> Result<ProvisionOutcome, WebhookError> {
        if event.parsed_type() != PaymentEventType::CheckoutSessionCompleted {
            return Err(WebhookError::Ignored(format!(
                "event type '{}' does not provision",
                event.event_type
            )));
        }

        let owner_email = event.owner_email()?;

        match self
            .events
            .mark_if_new(&event.id, &event.event_type)
            .await
            .map_err(|e| WebhookError::PersistenceUnavailable(e.to_string()))?
        {
            MarkOutcome::AlreadyProcessed => {
                info!(event_id = %event.id, "provisioning event replayed, acknowledging");
                return Ok(ProvisionOutcome::AlreadyProcessed);
            }
            MarkOutcome::Fresh => {}
        }

        let secret = KeySecret::generate();
        let key = ApiKey::issue(
            secret.clone(),
            owner_email.clone(),
            self.policy.request_limit,
            self.policy.ttl,
            event.id.clone(),
        )
        .map_err(|e| WebhookError::PayloadMalformed(e.to_string()))?;
        let key_id = key.id;

        if let Err(e) = self.keys.insert(&key).await {
            if e.code == ErrorCode::DuplicateEvent {
                // Two deliveries raced past the dedup check; the unique
                // provisioning_event_id constraint kept issuance single.
                info!(event_id = %event.id, "duplicate issuance blocked by store");
                return Ok(ProvisionOutcome::AlreadyProcessed);
            }
            if let Err(forget_err) = self.events.forget(&event.id).await {
                warn!(event_id = %event.id, error = %forget_err,
                    "failed to release dedup mark after insert failure");
            }
            return Err(WebhookError::PersistenceUnavailable(e.to_string()));
        }

        info!(key_id = %key_id, event_id = %event.id, "api key issued");

        if let Err(e) = self.notifier.deliver(&owner_email, &secret).await {
            // The key stays issued; the admin snapshot is the recovery path.
            warn!(key_id = %key_id, error = %e, "key notification delivery failed");
        }

        Ok(ProvisionOutcome::Issued { key_id })
    }
}
