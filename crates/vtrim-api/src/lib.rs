//! Axum HTTP API server.
//!
//! This crate provides:
//! - Video upload into the trusted root
//! - Timeline frame previews and trimming, cancelled when the client disconnects
//! - Artifact serving
//! - Security headers and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
