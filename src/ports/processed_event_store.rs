//! ProcessedEventStore port - idempotency tracking for provisioning events.
//!
//! The payment provider delivers at least once: timeouts, 5xx responses,
//! and lost acknowledgments all cause redelivery. Tracking processed event
//! identifiers with an atomic conditional insert keeps redelivery from
//! double-issuing keys.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;

/// Outcome of attempting to record an event identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// First time this event has been seen; the caller should process it.
    Fresh,
    /// The event was already recorded; the caller must not process it again.
    AlreadyProcessed,
}

/// Port for the event deduplication table.
#[async_trait]
pub trait ProcessedEventStore: Send + Sync {
    /// Records `event_id` if it has not been seen before.
    ///
    /// Atomic under concurrent redelivery of the same event: exactly one
    /// caller observes `Fresh`; every other concurrent or later caller
    /// observes `AlreadyProcessed`. Implementations use a conditional
    /// insert on the unique key, not a read-then-write.
    async fn mark_if_new(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<MarkOutcome, DomainError>;

    /// Removes a previously recorded event identifier.
    ///
    /// Compensation for the window where `mark_if_new` succeeded but the
    /// key insert failed: forgetting the mark lets the provider's
    /// redelivery retry issuance. Removing an id that is not present is
    /// not an error.
    async fn forget(&self, event_id: &str) -> Result<(), DomainError>;

    /// Deletes records processed before the retention cutoff.
    ///
    /// Returns the number of records removed. Run periodically; the
    /// retention window must comfortably exceed the provider's redelivery
    /// horizon, or a very late redelivery would issue a second key.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError>;
}
