//! Application layer: use-case handlers wiring ports together.

mod admin;
mod consume_access;
mod provision_key;

pub use admin::{ListKeysHandler, RevokeKeyHandler};
pub use consume_access::{AccessDecision, ConsumeAccessHandler};
pub use provision_key::{IssuancePolicy, ProvisionKeyHandler, ProvisionOutcome};
