//! HTTP adapter: axum routes, handlers, and DTOs.

pub mod dto;
mod handlers;
mod rate_limit;
mod routes;

pub use handlers::{AppState, ADMIN_TOKEN_HEADER, CREDENTIAL_HEADERS, SIGNATURE_HEADER};
pub use routes::router;
