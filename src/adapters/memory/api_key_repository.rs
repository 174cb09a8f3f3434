//! In-memory implementation of ApiKeyRepository.
//!
//! Backs tests and local development. One mutex guards the whole map, so
//! the check and the increment in `try_consume` are a single critical
//! section, matching the linearizability the port requires.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::credential::{ApiKey, KeySecret, KeyState};
use crate::domain::foundation::{ApiKeyId, DomainError, ErrorCode};
use crate::ports::{ApiKeyRepository, ConsumeOutcome, DenyReason};

/// Mutex-guarded map keyed by secret.
#[derive(Default)]
pub struct InMemoryApiKeyRepository {
    keys: Mutex<HashMap<String, ApiKey>>,
}

impl InMemoryApiKeyRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ApiKeyRepository for InMemoryApiKeyRepository {
    async fn insert(&self, key: &ApiKey) -> Result<(), DomainError> {
        let mut keys = self.keys.lock().unwrap();
        if keys.contains_key(key.secret.as_str()) {
            return Err(DomainError::database("secret collision"));
        }
        if let Some(event_id) = &key.provisioning_event_id {
            if keys
                .values()
                .any(|k| k.provisioning_event_id.as_deref() == Some(event_id))
            {
                return Err(DomainError::new(
                    ErrorCode::DuplicateEvent,
                    format!("key already issued for event {}", event_id),
                ));
            }
        }
        keys.insert(key.secret.as_str().to_string(), key.clone());
        Ok(())
    }

    async fn try_consume(
        &self,
        secret: &KeySecret,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, DomainError> {
        let mut keys = self.keys.lock().unwrap();
        let key = match keys.get_mut(secret.as_str()) {
            Some(key) => key,
            None => return Ok(ConsumeOutcome::Denied(DenyReason::NotFound)),
        };

        match key.state(now) {
            KeyState::Revoked => Ok(ConsumeOutcome::Denied(DenyReason::Revoked)),
            KeyState::Expired => Ok(ConsumeOutcome::Denied(DenyReason::Expired)),
            KeyState::QuotaExceeded => Ok(ConsumeOutcome::Denied(DenyReason::QuotaExceeded)),
            KeyState::Active => {
                key.request_count += 1;
                Ok(ConsumeOutcome::Admitted {
                    key_id: key.id,
                    remaining: key.remaining(),
                })
            }
        }
    }

    async fn find_by_id(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let keys = self.keys.lock().unwrap();
        Ok(keys.values().find(|k| &k.id == id).cloned())
    }

    async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        let keys = self.keys.lock().unwrap();
        let mut all: Vec<ApiKey> = keys.values().cloned().collect();
        all.sort_by_key(|k| k.issued_at);
        Ok(all)
    }

    async fn revoke(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        let mut keys = self.keys.lock().unwrap();
        match keys.values_mut().find(|k| &k.id == id) {
            Some(key) => {
                key.revoke();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_request_limit(&self, id: &ApiKeyId, limit: u32) -> Result<bool, DomainError> {
        if limit == 0 {
            return Err(DomainError::validation("request_limit must be positive"));
        }
        let mut keys = self.keys.lock().unwrap();
        match keys.values_mut().find(|k| &k.id == id) {
            Some(key) => {
                key.request_limit = limit;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
