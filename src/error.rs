//! Error types for the service locator and platform clients
//!
//! Registry failures are absorbed by the locator and only surface through
//! logs and metrics. Everything a caller can actually observe is one of the
//! typed errors below, or an anyhow error from application plumbing.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Failures on the registry lookup path
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistryError {
    #[error("Registry unreachable: {message}")]
    Unreachable { message: String },

    #[error("Registry returned HTTP {status} for '{service}'")]
    UnexpectedStatus { service: String, status: u16 },

    #[error("Malformed registry response for '{service}': {reason}")]
    MalformedResponse { service: String, reason: String },

    #[error("No registered instances for '{service}'")]
    NoInstances { service: String },
}

impl RegistryError {
    /// Short label used for logging and metric labels
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::Unreachable { .. } => "unreachable",
            RegistryError::UnexpectedStatus { .. } => "unexpected_status",
            RegistryError::MalformedResponse { .. } => "malformed_response",
            RegistryError::NoInstances { .. } => "no_instances",
        }
    }
}

/// Errors a caller of the service locator can observe
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LocatorError {
    #[error("Service '{service}' is unresolvable: registry lookup failed and no fallback URL is configured")]
    UnresolvableService {
        service: String,
        #[source]
        cause: RegistryError,
    },
}

/// Errors from the auth, package and booking clients
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Locator(#[from] LocatorError),

    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{service} rejected the request ({status}): {message}")]
    Rejected {
        service: String,
        status: u16,
        message: String,
    },

    #[error("Invalid response from {url}: {message}")]
    InvalidResponse { url: String, message: String },

    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    #[error("Not logged in")]
    MissingToken,

    #[error("Admin privileges required")]
    Forbidden,
}

impl ApiError {
    /// HTTP status reported by the backend, if the request reached one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
