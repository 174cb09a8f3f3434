//! Domain layer: pure types and rules, no I/O.

pub mod credential;
pub mod foundation;
pub mod webhook;
