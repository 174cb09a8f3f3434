//! API key secret value.
//!
//! A secret is 24 bytes from the operating system CSPRNG, hex-encoded to a
//! fixed 48-character string. 192 bits of entropy makes collisions between
//! independently generated secrets negligible.

use std::fmt;

use crate::domain::foundation::ValidationError;

/// Raw entropy per secret, in bytes.
pub const SECRET_BYTE_LENGTH: usize = 24;

/// Length of the hex-encoded secret string.
pub const SECRET_HEX_LENGTH: usize = 2 * SECRET_BYTE_LENGTH;

/// Opaque high-entropy API key secret.
///
/// Immutable once issued. `Debug` shows only a prefix so secrets cannot
/// leak through logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct KeySecret(String);

impl KeySecret {
    /// Generates a fresh secret from the OS CSPRNG.
    pub fn generate() -> Self {
        use rand::rngs::OsRng;
        use rand::RngCore;

        let mut bytes = [0u8; SECRET_BYTE_LENGTH];
        OsRng.fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }

    /// Parses a secret supplied by a caller.
    ///
    /// Accepts exactly [`SECRET_HEX_LENGTH`] lowercase or uppercase hex
    /// characters; anything else is rejected before it reaches the store.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if s.len() != SECRET_HEX_LENGTH {
            return Err(ValidationError::invalid_format(
                "secret",
                format!("expected {} characters, got {}", SECRET_HEX_LENGTH, s.len()),
            ));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ValidationError::invalid_format(
                "secret",
                "expected hex characters",
            ));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Returns the hex string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the secret, returning the hex string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for KeySecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KeySecret({}…)", &self.0[..8.min(self.0.len())])
    }
}
