//! Keygate - API key issuing and metering service
//!
//! This crate provisions API keys from payment provider webhooks and
//! meters access to a protected endpoint against per-key request quotas.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
