//! Axum-based HTTP server components.
//!
//! This module wires the REST API: request/response DTOs, error mapping,
//! handlers, router, and shared application state.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::{ApiError, AppError};
pub use router::create_router;
pub use state::AppState;
