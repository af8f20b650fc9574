//! Wayfinder - service locator for the travel booking platform
//!
//! Resolves logical service names (`auth-service`, `package-service`,
//! `booking-service`) to base URLs through a Consul registry, falling back to
//! a static table when the registry cannot answer. Typed clients for the
//! platform backends build on the locator.

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metrics;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{ApiError, LocatorError, RegistryError, Result};
pub use types::*;

// Re-export key components
pub use discovery::{FallbackTable, SelectionPolicy, ServiceLocator, ServiceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
