//! In-memory implementation of ProcessedEventStore.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::foundation::DomainError;
use crate::ports::{MarkOutcome, ProcessedEventStore};

/// Mutex-guarded event id set; the lock makes `mark_if_new` atomic.
#[derive(Default)]
pub struct InMemoryProcessedEventStore {
    events: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl InMemoryProcessedEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of recorded events. Test helper.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ProcessedEventStore for InMemoryProcessedEventStore {
    async fn mark_if_new(
        &self,
        event_id: &str,
        _event_type: &str,
    ) -> Result<MarkOutcome, DomainError> {
        let mut events = self.events.lock().unwrap();
        if events.contains_key(event_id) {
            Ok(MarkOutcome::AlreadyProcessed)
        } else {
            events.insert(event_id.to_string(), Utc::now());
            Ok(MarkOutcome::Fresh)
        }
    }

    async fn forget(&self, event_id: &str) -> Result<(), DomainError> {
        self.events.lock().unwrap().remove(event_id);
        Ok(())
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut events = self.events.lock().unwrap();
        let before = events.len();
        events.retain(|_, processed_at| *processed_at >= cutoff);
        Ok((before - events.len()) as u64)
    }
}
