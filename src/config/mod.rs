//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `KEYGATE_` prefix and nested values use underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use keygate::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Server listening on {:?}", config.server.socket_addr());
//! ```

mod admin;
mod database;
mod email;
mod error;
mod issuance;
mod payment;
mod server;

pub use admin::AdminConfig;
pub use database::DatabaseConfig;
pub use email::EmailConfig;
pub use error::{ConfigError, ValidationError};
pub use issuance::IssuanceConfig;
pub use payment::PaymentConfig;
pub use server::ServerConfig;

use serde::Deserialize;

/// Root application configuration
///
/// Contains all configuration sections for the keygate service.
/// Load using [`AppConfig::load()`] which reads from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, timeouts)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Payment webhook configuration (signing secret)
    pub payment: PaymentConfig,

    /// Email configuration (Resend)
    pub email: EmailConfig,

    /// Admin access configuration (shared secret)
    pub admin: AdminConfig,

    /// Key issuance configuration (quota, TTL)
    #[serde(default)]
    pub issuance: IssuanceConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `KEYGATE` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `KEYGATE__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `KEYGATE__DATABASE__URL=...` -> `database.url = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Required environment variables are missing
    /// - Values cannot be parsed into expected types
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (development)
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("KEYGATE")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate()?;
        self.email.validate()?;
        self.admin.validate()?;
        self.issuance.validate()?;
        Ok(())
    }
}
