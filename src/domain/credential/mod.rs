//! Credential domain: the API key record, its secret, and its state machine.

mod api_key;
mod secret;

pub use api_key::{ApiKey, KeyState};
pub use secret::{KeySecret, SECRET_BYTE_LENGTH, SECRET_HEX_LENGTH};
