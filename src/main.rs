//! Keygate service entrypoint
//!
//! Loads configuration, connects to PostgreSQL, wires the application
//! handlers to their adapters, and serves the HTTP API.

use std::sync::Arc;

use secrecy::SecretString;
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tracing::info;
use tracing_subscriber::EnvFilter;

use keygate::adapters::email::ResendNotifier;
use keygate::adapters::http::{router, AppState};
use keygate::adapters::postgres::{PostgresApiKeyRepository, PostgresProcessedEventStore};
use keygate::config::AppConfig;
use keygate::domain::webhook::WebhookVerifier;
use keygate::ports::ProcessedEventStore;

/// Processed-event rows older than this are swept. Must comfortably exceed
/// the payment provider's redelivery horizon.
const EVENT_RETENTION_DAYS: i64 = 30;

/// Interval between retention sweeps.
const EVENT_SWEEP_INTERVAL: std::time::Duration = std::time::Duration::from_secs(60 * 60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.server.log_level))
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        host = %config.server.host,
        port = config.server.port,
        "Starting keygate"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;
    info!("Database connection established");

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Migrations applied");
    }

    let events: Arc<dyn ProcessedEventStore> =
        Arc::new(PostgresProcessedEventStore::new(pool.clone()));
    spawn_event_retention_sweep(events.clone());

    let state = AppState {
        keys: Arc::new(PostgresApiKeyRepository::new(pool)),
        events,
        notifier: Arc::new(ResendNotifier::new(
            SecretString::new(config.email.resend_api_key.clone()),
            config.email.from_header(),
        )),
        verifier: Arc::new(WebhookVerifier::new(SecretString::new(
            config.payment.webhook_secret.clone(),
        ))),
        policy: config.issuance.policy(),
        admin_token: SecretString::new(config.admin.token.clone()),
    };

    let app = router(
        state,
        config.server.request_timeout(),
        config.server.rate_limit_per_minute,
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Periodically removes deduplication records past the retention window.
///
/// The sweep keeps the processed_events table from growing without bound;
/// the provider stops redelivering an event long before its record ages out.
fn spawn_event_retention_sweep(events: Arc<dyn ProcessedEventStore>) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(EVENT_SWEEP_INTERVAL).await;
            let cutoff = chrono::Utc::now() - chrono::Duration::days(EVENT_RETENTION_DAYS);
            match events.delete_before(cutoff).await {
                Ok(count) if count > 0 => {
                    info!(deleted = count, "Swept aged processed-event records");
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Processed-event retention sweep failed");
                }
            }
        }
    });
}

/// Resolves on Ctrl+C or SIGTERM so in-flight requests can drain.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}
