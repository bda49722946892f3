//! Axum HTTP API server.
//!
//! This crate provides:
//! - Multipart conversion submission and status polling
//! - Remote URL metadata lookups
//! - Static serving of finished outputs
//! - Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
