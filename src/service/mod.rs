//! Service layer for `wayfinder serve`
//!
//! Application state, health checks and background task management for the
//! long-running locator.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus};
