//! PostgreSQL adapters.

mod api_key_repository;
mod processed_event_store;

pub use api_key_repository::PostgresApiKeyRepository;
pub use processed_event_store::PostgresProcessedEventStore;
