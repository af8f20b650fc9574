//! Service locator
//!
//! Resolves a logical service name to a base URL. Each call makes exactly
//! one registry query; when that query fails in any way the static fallback
//! table answers instead. Nothing is cached between calls.

use crate::config::AppConfig;
use crate::discovery::fallback::FallbackTable;
use crate::discovery::policy::{InstanceSelector, SelectionPolicy};
use crate::discovery::registry::{ConsulRegistry, ServiceRegistry};
use crate::error::{LocatorError, RegistryError};
use crate::metrics::collector::MetricsTimer;
use crate::metrics::MetricsCollector;
use crate::types::{Resolution, ResolutionSource, ResolvedUrl, ServiceName};
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Resolves service names through a registry with a static fallback
pub struct ServiceLocator {
    registry: Arc<dyn ServiceRegistry>,
    fallback: FallbackTable,
    selector: InstanceSelector,
    metrics: Option<Arc<MetricsCollector>>,
}

impl ServiceLocator {
    /// Locator with the compiled-in fallback table and first-wins selection
    pub fn new(registry: Arc<dyn ServiceRegistry>) -> Self {
        Self {
            registry,
            fallback: FallbackTable::new(),
            selector: InstanceSelector::new(SelectionPolicy::First),
            metrics: None,
        }
    }

    /// Build a locator backed by a Consul registry from configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let registry = ConsulRegistry::new(
            config.registry.base_url(),
            config.registry.lookup_mode,
            config.registry_timeout(),
        )?;

        Ok(Self::new(Arc::new(registry))
            .with_fallback(config.fallback_table()?)
            .with_policy(config.registry.selection_policy))
    }

    pub fn with_fallback(mut self, fallback: FallbackTable) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_policy(mut self, policy: SelectionPolicy) -> Self {
        self.selector = InstanceSelector::new(policy);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> Arc<dyn ServiceRegistry> {
        self.registry.clone()
    }

    pub fn fallback(&self) -> &FallbackTable {
        &self.fallback
    }

    pub fn policy(&self) -> SelectionPolicy {
        self.selector.policy()
    }

    /// Resolve a service to its base URL
    pub async fn resolve(&self, service: &ServiceName) -> Result<ResolvedUrl, LocatorError> {
        self.resolve_detailed(service)
            .await
            .map(|resolution| resolution.url)
    }

    /// Resolve a service and report whether the registry or the fallback
    /// table produced the answer
    pub async fn resolve_detailed(
        &self,
        service: &ServiceName,
    ) -> Result<Resolution, LocatorError> {
        let timer = MetricsTimer::start();

        let cause = match self.query_registry(service).await {
            Ok(url) => {
                debug!("Resolved {} via registry: {}", service, url);
                self.record_resolution(service, ResolutionSource::Registry, &timer);
                return Ok(Resolution {
                    service: service.clone(),
                    url,
                    source: ResolutionSource::Registry,
                });
            }
            Err(cause) => cause,
        };

        warn!("Error obtaining URL for {} from registry: {}", service, cause);
        if let Some(metrics) = &self.metrics {
            metrics.record_registry_error(service, cause.kind());
        }

        match self.fallback.get(service) {
            Some(url) => {
                debug!("Using fallback URL for {}: {}", service, url);
                self.record_resolution(service, ResolutionSource::Fallback, &timer);
                Ok(Resolution {
                    service: service.clone(),
                    url: url.clone(),
                    source: ResolutionSource::Fallback,
                })
            }
            None => {
                error!(
                    "No fallback URL for {} and registry lookup failed",
                    service
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_unresolvable(service);
                }
                Err(LocatorError::UnresolvableService {
                    service: service.to_string(),
                    cause,
                })
            }
        }
    }

    async fn query_registry(&self, service: &ServiceName) -> Result<ResolvedUrl, RegistryError> {
        let records = self.registry.lookup(service).await?;

        let record = self
            .selector
            .select(service, &records)
            .ok_or_else(|| RegistryError::NoInstances {
                service: service.to_string(),
            })?;

        ResolvedUrl::from_record(record).map_err(|reason| RegistryError::MalformedResponse {
            service: service.to_string(),
            reason,
        })
    }

    fn record_resolution(&self, service: &ServiceName, source: ResolutionSource, timer: &MetricsTimer) {
        if let Some(metrics) = &self.metrics {
            metrics.record_resolution(service, source, timer.elapsed());
        }
    }
}
