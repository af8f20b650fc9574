//! Metrics collection using Prometheus
//!
//! Counters and histograms for resolve outcomes, registry failures and
//! backend requests made through the platform clients.

use crate::types::{ResolutionSource, ServiceName};
use anyhow::Result;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the locator
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Resolve outcomes and registry failures
    locator_metrics: LocatorMetrics,

    /// Requests made by the platform clients
    client_metrics: ClientMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Locator metrics
#[derive(Clone)]
pub struct LocatorMetrics {
    /// Successful resolutions by service and source
    pub resolutions_total: IntCounterVec,

    /// Registry failures absorbed by the fallback path
    pub registry_errors_total: IntCounterVec,

    /// Calls that could not be resolved at all
    pub unresolvable_total: IntCounterVec,

    /// End-to-end resolve latency
    pub resolve_duration_seconds: HistogramVec,
}

/// Platform client metrics
#[derive(Clone)]
pub struct ClientMetrics {
    /// Backend requests by service and outcome
    pub requests_total: IntCounterVec,

    /// Backend request latency
    pub request_duration_seconds: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let locator_metrics = LocatorMetrics::new(&registry)?;
        let client_metrics = ClientMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            locator_metrics,
            client_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn locator(&self) -> &LocatorMetrics {
        &self.locator_metrics
    }

    pub fn client(&self) -> &ClientMetrics {
        &self.client_metrics
    }

    /// Record a successful resolution
    pub fn record_resolution(
        &self,
        service: &ServiceName,
        source: ResolutionSource,
        duration: Duration,
    ) {
        self.locator_metrics
            .resolutions_total
            .with_label_values(&[service.as_str(), source.as_str()])
            .inc();

        self.locator_metrics
            .resolve_duration_seconds
            .with_label_values(&[source.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Record a registry failure that triggered the fallback path
    pub fn record_registry_error(&self, service: &ServiceName, kind: &str) {
        self.locator_metrics
            .registry_errors_total
            .with_label_values(&[service.as_str(), kind])
            .inc();
    }

    /// Record a call that ended in an unresolvable service
    pub fn record_unresolvable(&self, service: &ServiceName) {
        self.locator_metrics
            .unresolvable_total
            .with_label_values(&[service.as_str()])
            .inc();
    }

    /// Record a backend request made by a platform client
    pub fn record_api_request(&self, service: &ServiceName, success: bool, duration: Duration) {
        let outcome = if success { "success" } else { "error" };

        self.client_metrics
            .requests_total
            .with_label_values(&[service.as_str(), outcome])
            .inc();

        self.client_metrics
            .request_duration_seconds
            .with_label_values(&[service.as_str()])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    /// Start timing an operation
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("wayfinder_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "wayfinder_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("wayfinder_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl LocatorMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let resolutions_total = IntCounterVec::new(
            Opts::new(
                "wayfinder_resolutions_total",
                "Resolved service URLs by source",
            ),
            &["service", "source"],
        )?;
        registry.register(Box::new(resolutions_total.clone()))?;

        let registry_errors_total = IntCounterVec::new(
            Opts::new(
                "wayfinder_registry_errors_total",
                "Registry lookups that fell back to the static table",
            ),
            &["service", "kind"],
        )?;
        registry.register(Box::new(registry_errors_total.clone()))?;

        let unresolvable_total = IntCounterVec::new(
            Opts::new(
                "wayfinder_unresolvable_total",
                "Resolve calls with no registry answer and no fallback",
            ),
            &["service"],
        )?;
        registry.register(Box::new(unresolvable_total.clone()))?;

        let resolve_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "wayfinder_resolve_duration_seconds",
                "Resolve call duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
            &["source"],
        )?;
        registry.register(Box::new(resolve_duration_seconds.clone()))?;

        Ok(Self {
            resolutions_total,
            registry_errors_total,
            unresolvable_total,
            resolve_duration_seconds,
        })
    }
}

impl ClientMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let requests_total = IntCounterVec::new(
            Opts::new(
                "wayfinder_backend_requests_total",
                "Backend requests made by the platform clients",
            ),
            &["service", "outcome"],
        )?;
        registry.register(Box::new(requests_total.clone()))?;

        let request_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "wayfinder_backend_request_duration_seconds",
                "Backend request duration",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
            &["service"],
        )?;
        registry.register(Box::new(request_duration_seconds.clone()))?;

        Ok(Self {
            requests_total,
            request_duration_seconds,
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("Failed to create default metrics collector")
    }
}
