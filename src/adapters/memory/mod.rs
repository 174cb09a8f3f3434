//! In-memory adapters for tests and local development.
//!
//! Both stores guard their state with a single mutex, so the conditional
//! mutations the ports require really are atomic here too.

mod api_key_repository;
mod processed_event_store;

pub use api_key_repository::InMemoryApiKeyRepository;
pub use processed_event_store::InMemoryProcessedEventStore;
