//! Ports - interfaces between the domain and the outside world.
//!
//! Following hexagonal architecture, ports define the contracts the
//! application layer depends on; adapters implement them.
//!
//! - `ApiKeyRepository` - credential store with the atomic quota gate
//! - `ProcessedEventStore` - provisioning-event idempotency tracking
//! - `KeyNotifier` - delivery of issued keys to their owners

mod api_key_repository;
mod key_notifier;
mod processed_event_store;

pub use api_key_repository::{ApiKeyRepository, ConsumeOutcome, DenyReason};
pub use key_notifier::{KeyNotifier, NotifyError};
pub use processed_event_store::{MarkOutcome, ProcessedEventStore};
