//! PostgreSQL implementation of ApiKeyRepository.
//!
//! The quota gate is a single conditional `UPDATE ... RETURNING`: the
//! database evaluates the revocation/expiry/quota guard and the increment
//! as one statement, which keeps concurrent callers correct across any
//! number of process instances. A denied attempt re-reads the row only to
//! name the reason; the admit path never separates read from write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::credential::{ApiKey, KeySecret};
use crate::domain::foundation::{ApiKeyId, DomainError, ErrorCode};
use crate::ports::{ApiKeyRepository, ConsumeOutcome, DenyReason};

/// PostgreSQL-backed credential store.
pub struct PostgresApiKeyRepository {
    pool: PgPool,
}

impl PostgresApiKeyRepository {
    /// Creates a repository over the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Database row representation of an API key.
#[derive(Debug, sqlx::FromRow)]
struct ApiKeyRow {
    id: Uuid,
    secret: String,
    owner_email: String,
    issued_at: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    request_count: i32,
    request_limit: i32,
    revoked: bool,
    provisioning_event_id: Option<String>,
}

impl TryFrom<ApiKeyRow> for ApiKey {
    type Error = DomainError;

    fn try_from(row: ApiKeyRow) -> Result<Self, Self::Error> {
        let secret = KeySecret::parse(&row.secret).map_err(|e| {
            DomainError::new(ErrorCode::DatabaseError, format!("Invalid secret: {}", e))
        })?;
        let request_count = u32::try_from(row.request_count).map_err(|_| {
            DomainError::new(ErrorCode::DatabaseError, "Negative request_count in row")
        })?;
        let request_limit = u32::try_from(row.request_limit)
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or_else(|| {
                DomainError::new(ErrorCode::DatabaseError, "Non-positive request_limit in row")
            })?;

        Ok(ApiKey {
            id: ApiKeyId::from_uuid(row.id),
            secret,
            owner_email: row.owner_email,
            issued_at: row.issued_at,
            expires_at: row.expires_at,
            request_count,
            request_limit,
            revoked: row.revoked,
            provisioning_event_id: row.provisioning_event_id,
        })
    }
}

#[async_trait]
impl ApiKeyRepository for PostgresApiKeyRepository {
    async fn insert(&self, key: &ApiKey) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO api_keys (
                id, secret, owner_email, issued_at, expires_at,
                request_count, request_limit, revoked, provisioning_event_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(key.id.as_uuid())
        .bind(key.secret.as_str())
        .bind(&key.owner_email)
        .bind(key.issued_at)
        .bind(key.expires_at)
        .bind(key.request_count as i32)
        .bind(key.request_limit as i32)
        .bind(key.revoked)
        .bind(&key.provisioning_event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.constraint() == Some("api_keys_provisioning_event_id_key") {
                    return DomainError::new(
                        ErrorCode::DuplicateEvent,
                        "A key was already issued for this provisioning event",
                    );
                }
            }
            DomainError::database(format!("Failed to insert api key: {}", e))
        })?;

        Ok(())
    }

    async fn try_consume(
        &self,
        secret: &KeySecret,
        now: DateTime<Utc>,
    ) -> Result<ConsumeOutcome, DomainError> {
        // Guard and increment in one statement. RETURNING sees the updated
        // row, so remaining = request_limit - request_count directly. The id
        // comes back with it so the caller can log which key was admitted.
        let admitted: Option<(Uuid, i32)> = sqlx::query_as(
            r#"
            UPDATE api_keys
               SET request_count = request_count + 1
             WHERE secret = $1
               AND revoked = FALSE
               AND (expires_at IS NULL OR expires_at > $2)
               AND request_count < request_limit
            RETURNING id, request_limit - request_count
            "#,
        )
        .bind(secret.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Quota update failed: {}", e)))?;

        if let Some((id, remaining)) = admitted {
            return Ok(ConsumeOutcome::Admitted {
                key_id: ApiKeyId::from_uuid(id),
                remaining: remaining.max(0) as u32,
            });
        }

        // The guard refused; classify the denial. This read may race other
        // writers, but a mis-labelled denial is still a denial.
        let row: Option<ApiKeyRow> = sqlx::query_as(
            r#"
            SELECT id, secret, owner_email, issued_at, expires_at,
                   request_count, request_limit, revoked, provisioning_event_id
              FROM api_keys
             WHERE secret = $1
            "#,
        )
        .bind(secret.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Denial lookup failed: {}", e)))?;

        let reason = match row {
            None => DenyReason::NotFound,
            Some(row) => {
                let key = ApiKey::try_from(row)?;
                if key.revoked {
                    DenyReason::Revoked
                } else if key.is_expired(now) {
                    DenyReason::Expired
                } else {
                    DenyReason::QuotaExceeded
                }
            }
        };

        Ok(ConsumeOutcome::Denied(reason))
    }

    async fn find_by_id(&self, id: &ApiKeyId) -> Result<Option<ApiKey>, DomainError> {
        let row: Option<ApiKeyRow> = sqlx::query_as(
            r#"
            SELECT id, secret, owner_email, issued_at, expires_at,
                   request_count, request_limit, revoked, provisioning_event_id
              FROM api_keys
             WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Key lookup failed: {}", e)))?;

        row.map(ApiKey::try_from).transpose()
    }

    async fn list(&self) -> Result<Vec<ApiKey>, DomainError> {
        let rows: Vec<ApiKeyRow> = sqlx::query_as(
            r#"
            SELECT id, secret, owner_email, issued_at, expires_at,
                   request_count, request_limit, revoked, provisioning_event_id
              FROM api_keys
             ORDER BY issued_at
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Key listing failed: {}", e)))?;

        rows.into_iter().map(ApiKey::try_from).collect()
    }

    async fn revoke(&self, id: &ApiKeyId) -> Result<bool, DomainError> {
        // One-way by construction: the statement only ever sets TRUE.
        let result = sqlx::query("UPDATE api_keys SET revoked = TRUE WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Revoke failed: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    async fn set_request_limit(&self, id: &ApiKeyId, limit: u32) -> Result<bool, DomainError> {
        if limit == 0 {
            return Err(DomainError::validation("request_limit must be positive"));
        }
        let result = sqlx::query("UPDATE api_keys SET request_limit = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(limit as i32)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Limit update failed: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }
}
