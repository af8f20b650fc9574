//! Clients for the platform backends
//!
//! Every call resolves its base URL through the service locator first, so
//! the clients follow instances as they move in the registry.

pub mod auth;
pub mod bookings;
pub mod catalog;
pub mod packages;
pub mod session;

pub use auth::{AuthClient, Credentials, SignupRequest, UserProfile};
pub use bookings::{
    Booking, BookingClient, BookingList, BookingReport, BookingRequest, BookingStatus,
};
pub use catalog::PackageCatalog;
pub use packages::{PackageClient, PackageInput, PackageList, TravelPackage};
pub use session::{Session, SessionStore};

use crate::discovery::ServiceLocator;
use crate::error::ApiError;
use crate::metrics::collector::MetricsTimer;
use crate::metrics::MetricsCollector;
use crate::types::ServiceName;
use anyhow::Context;
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Plain `{"message": ...}` acknowledgement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
}

/// `/health` answer of a backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Accept identifiers sent either as JSON strings or as integers
pub(crate) fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(id) => id,
        RawId::Number(id) => id.to_string(),
    })
}

/// Shared HTTP plumbing for the backend clients
#[derive(Clone)]
pub struct PlatformClient {
    locator: Arc<ServiceLocator>,
    http: reqwest::Client,
    token: Option<String>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl PlatformClient {
    /// Create a client that resolves backends through `locator`
    pub fn new(locator: Arc<ServiceLocator>, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build backend HTTP client")?;

        Ok(Self {
            locator,
            http,
            token: None,
            metrics: None,
        })
    }

    /// Attach a bearer token to authorized calls
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn locator(&self) -> &Arc<ServiceLocator> {
        &self.locator
    }

    /// Query a backend's `/health` endpoint
    pub async fn health(&self, service: &ServiceName) -> Result<BackendHealth, ApiError> {
        self.call(service, Method::GET, "/health", false, |request| request)
            .await
    }

    /// Resolve `service`, send one request to `path` and decode the JSON answer.
    /// `authorized` calls fail early when no token is set.
    pub(crate) async fn call<T, F>(
        &self,
        service: &ServiceName,
        method: Method,
        path: &str,
        authorized: bool,
        prepare: F,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: FnOnce(RequestBuilder) -> RequestBuilder,
    {
        let token = match (authorized, &self.token) {
            (true, None) => return Err(ApiError::MissingToken),
            (true, Some(token)) => Some(token.as_str()),
            (false, _) => None,
        };

        let base_url = self.locator.resolve(service).await?;
        let url = base_url.join(path);
        debug!("{} {}", method, url);

        let mut request = prepare(self.http.request(method, &url));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let timer = MetricsTimer::start();
        let result = self.send(service, &url, request).await;
        let elapsed = timer.stop();
        if let Some(metrics) = &self.metrics {
            metrics.record_api_request(service, result.is_ok(), elapsed);
        }
        result
    }

    async fn send<T: DeserializeOwned>(
        &self,
        service: &ServiceName,
        url: &str,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        let response = request.send().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorBody>(&body)
                .ok()
                .and_then(|body| body.error.or(body.message))
                .unwrap_or_else(|| {
                    status
                        .canonical_reason()
                        .unwrap_or("Unexpected status")
                        .to_string()
                });

            warn!("{} answered {} for {}: {}", service, status, url, message);
            return Err(ApiError::Rejected {
                service: service.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| ApiError::InvalidResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
