//! PostgreSQL implementation of ProcessedEventStore.
//!
//! `mark_if_new` is `INSERT ... ON CONFLICT DO NOTHING` against the
//! primary key: exactly one of any set of concurrent deliveries inserts a
//! row, and `rows_affected` tells each caller which side it was on.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;

use crate::domain::foundation::DomainError;
use crate::ports::{MarkOutcome, ProcessedEventStore};

/// PostgreSQL-backed event deduplication table.
pub struct PostgresProcessedEventStore {
    pool: PgPool,
}

impl PostgresProcessedEventStore {
    /// Creates a store over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProcessedEventStore for PostgresProcessedEventStore {
    async fn mark_if_new(
        &self,
        event_id: &str,
        event_type: &str,
    ) -> Result<MarkOutcome, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO processed_events (event_id, event_type, processed_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id) DO NOTHING
            "#,
        )
        .bind(event_id)
        .bind(event_type)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Event mark failed: {}", e)))?;

        if result.rows_affected() == 1 {
            Ok(MarkOutcome::Fresh)
        } else {
            Ok(MarkOutcome::AlreadyProcessed)
        }
    }

    async fn forget(&self, event_id: &str) -> Result<(), DomainError> {
        sqlx::query("DELETE FROM processed_events WHERE event_id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Event forget failed: {}", e)))?;

        Ok(())
    }

    async fn delete_before(&self, cutoff: chrono::DateTime<Utc>) -> Result<u64, DomainError> {
        let result = sqlx::query("DELETE FROM processed_events WHERE processed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Retention sweep failed: {}", e)))?;

        Ok(result.rows_affected())
    }
}
