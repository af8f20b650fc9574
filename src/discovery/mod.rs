//! Service discovery for the platform backends
//!
//! This module resolves logical service names to base URLs using a
//! registry, a selection policy and a static fallback table, and handles
//! registering instances with the registry agent.

pub mod fallback;
pub mod locator;
pub mod policy;
pub mod registration;
pub mod registry;

// Re-export commonly used types
pub use fallback::{FallbackTable, DEFAULT_FALLBACKS};
pub use locator::ServiceLocator;
pub use policy::{InstanceSelector, SelectionPolicy};
pub use registration::{AgentCheck, RegistrationGuard, ServiceRegistrar, ServiceRegistration};
pub use registry::{ConsulRegistry, LookupMode, ServiceRegistry};
