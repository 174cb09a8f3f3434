//! ApiKeyRepository port - durable storage for issued keys.
//!
//! The correctness-critical operation is [`ApiKeyRepository::try_consume`]:
//! the revocation/expiry/quota checks and the increment must be one
//! indivisible operation per key. Implementations express the guard and the
//! increment together (a storage-level conditional update, or a single lock
//! held across check and increment), never a read followed by a separate
//! write, so that two concurrent calls at `request_count == request_limit - 1`
//! cannot both be admitted.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::credential::{ApiKey, KeySecret};
use crate::domain::foundation::{ApiKeyId, DomainError};

/// Why a consume attempt was denied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    /// No key with this secret exists.
    NotFound,
    /// The key has been revoked.
    Revoked,
    /// The key is past its expiry.
    Expired,
    /// The request count has reached the limit.
    QuotaExceeded,
}

/// Outcome of an atomic check-and-consume attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// One unit of quota was consumed from the key identified by `key_id`;
    /// `remaining` units are left. The id (never the secret) is what the
    /// access log carries.
    Admitted { key_id: ApiKeyId, remaining: u32 },
    /// Nothing was consumed.
    Denied(DenyReason),
}

/// Port for the credential store.
///
/// All mutations to a single key are linearizable with respect to each
/// other; implementations serialize them at the storage level so the
/// guarantees hold across process instances.
#[async_trait]
pub trait ApiKeyRepository: Send + Sync {
    /// Persists a newly issued key.
    ///
    /// A duplicate `provisioning_event_id` is reported as
    /// `ErrorCode::DuplicateEvent`; the provisioner treats that as an
    /// idempotent success.
    async fn insert(&self, key: &ApiKey) -> Result<(), DomainError>;

    /// Atomically checks the key's state and consumes one unit of quota.
    ///
    /// Guard order: not found, revoked, expired, quota. The increment is
    /// applied only on admission; a denied call leaves the record untouched.
    async fn try_consume(
        &self,
        secret: &KeySecret,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, DomainError>;

    /// Looks up a key by its identifier.
    async fn find_by_id(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError>;

    /// Snapshot of every key, for admin listing.
    async fn list(&self) -> Result<Vec<ApiKey>, DomainError>;

    /// Flips `revoked` to true. Returns false if no such key exists.
    ///
    /// One-way: there is deliberately no operation that clears the flag.
    async fn revoke(&self, id: &ApiKeyId) -> Result<bool, DomainError>;

    /// Administratively changes the request limit.
    /// Returns false if no such key exists.
    async fn set_request_limit(&self, id: &ApiKeyId, limit: u32) -> Result<bool, DomainError>;
}
