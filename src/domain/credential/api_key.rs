//! The API key record and its state machine.
//!
//! An `ApiKey` is created once by the provisioner, metered by the access
//! gate, and revoked (never deleted) by admin control. Its effective state
//! is a pure function of its fields, evaluated with revocation first, then
//! expiry, then quota.

use chrono::{DateTime, Duration, Utc};

use super::secret::KeySecret;
use crate::domain::foundation::{ApiKeyId, ValidationError};

/// Effective state of a key at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    /// Not revoked, not expired, quota remaining.
    Active,
    /// Past its `expires_at` timestamp.
    Expired,
    /// Administratively revoked (one-way).
    Revoked,
    /// `request_count` has reached `request_limit`.
    QuotaExceeded,
}

impl KeyState {
    /// Lowercase label used in admin responses and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyState::Active => "active",
            KeyState::Expired => "expired",
            KeyState::Revoked => "revoked",
            KeyState::QuotaExceeded => "quota_exceeded",
        }
    }
}

/// An issued API key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiKey {
    /// Stable identifier, safe to log.
    pub id: ApiKeyId,
    /// The secret presented by callers. Unique across all keys.
    pub secret: KeySecret,
    /// The tenant the key was issued for.
    pub owner_email: String,
    /// Creation timestamp.
    pub issued_at: DateTime<Utc>,
    /// Absolute expiry; `None` means the key never expires.
    pub expires_at: Option<DateTime<Utc>>,
    /// Requests consumed so far. Monotonically non-decreasing.
    pub request_count: u32,
    /// Ceiling on `request_count`. Always positive.
    pub request_limit: u32,
    /// One-way revocation flag.
    pub revoked: bool,
    /// Identifier of the provisioning event that created this key.
    /// Unique when present; the second idempotency guard.
    pub provisioning_event_id: Option<String>,
}

impl ApiKey {
    /// Issues a new key with a zero request count.
    ///
    /// # Errors
    ///
    /// Rejects a non-positive `request_limit` or an implausible owner email
    /// rather than constructing an invalid record.
    pub fn issue(
        secret: KeySecret,
        owner_email: impl Into<String>,
        request_limit: u32,
        ttl: Option<Duration>,
        provisioning_event_id: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let owner_email = owner_email.into();
        if owner_email.trim().is_empty() {
            return Err(ValidationError::empty_field("owner_email"));
        }
        if !owner_email.contains('@') {
            return Err(ValidationError::invalid_format(
                "owner_email",
                "missing '@'",
            ));
        }
        if request_limit == 0 {
            return Err(ValidationError::not_positive("request_limit", 0));
        }

        let issued_at = Utc::now();
        Ok(Self {
            id: ApiKeyId::new(),
            secret,
            owner_email,
            issued_at,
            expires_at: ttl.map(|d| issued_at + d),
            request_count: 0,
            request_limit,
            revoked: false,
            provisioning_event_id: Some(provisioning_event_id.into()),
        })
    }

    /// Returns the effective state at `now`.
    ///
    /// Precedence: revoked, then expired, then quota.
    pub fn state(&self, now: DateTime<Utc>) -> KeyState {
        if self.revoked {
            KeyState::Revoked
        } else if self.is_expired(now) {
            KeyState::Expired
        } else if self.request_count >= self.request_limit {
            KeyState::QuotaExceeded
        } else {
            KeyState::Active
        }
    }

    /// True if `expires_at` is set and in the past.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    /// Requests still available before the limit.
    pub fn remaining(&self) -> u32 {
        self.request_limit.saturating_sub(self.request_count)
    }

    /// Marks the key revoked. Irreversible; calling twice is a no-op.
    pub fn revoke(&mut self) {
        self.revoked = true;
    }
}
