//! Axum HTTP API server.
//!
//! This crate provides:
//! - The generation orchestrator (the one place credits are spent)
//! - Gallery, credit and admin endpoints
//! - Session token verification
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, AuthConfig};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use services::{CreditService, GenerationService, UserService};
pub use state::AppState;
