//! Application state for `wayfinder serve`
//!
//! Owns the locator, the metrics collector and the HTTP endpoints, and runs
//! the background task that keeps the health gauges current.

use crate::config::AppConfig;
use crate::discovery::ServiceLocator;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector, MetricsService};
use crate::service::health::HealthCheck;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// How often uptime and health gauges are refreshed
const HEALTH_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state shared with the HTTP handlers
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    locator: Arc<ServiceLocator>,

    metrics: Arc<MetricsCollector>,

    /// Set while `start` has run and `shutdown` has not
    metrics_service: Mutex<Option<MetricsService>>,

    /// Background task handles
    background_tasks: Mutex<Vec<JoinHandle<()>>>,

    started_at: Instant,

    /// Service status
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Build the locator and metrics from configuration
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        info!("Initializing wayfinder locator service");
        info!(
            "Configuration: service={}, registry={}, lookup={}, policy={}",
            config.service.name,
            config.registry.base_url(),
            config.registry.lookup_mode,
            config.registry.selection_policy
        );

        let metrics =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let locator = ServiceLocator::from_config(&config)
            .map_err(|e| ServiceError::Configuration {
                message: format!("Failed to build service locator: {}", e),
            })?
            .with_metrics(metrics.clone());

        Ok(Self::with_components(config, Arc::new(locator), metrics))
    }

    /// Assemble state from pre-built parts
    pub fn with_components(
        config: AppConfig,
        locator: Arc<ServiceLocator>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            config,
            locator,
            metrics,
            metrics_service: Mutex::new(None),
            background_tasks: Mutex::new(Vec::new()),
            started_at: Instant::now(),
            is_running: Arc::new(RwLock::new(false)),
        }
    }

    /// Start the HTTP endpoints and background tasks
    pub async fn start(self: &Arc<Self>) -> Result<(), ServiceError> {
        info!("Starting wayfinder locator service");

        self.set_running(true).await;

        self.start_metrics_service().await?;
        self.start_background_tasks().await;

        info!("✅ Wayfinder locator service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of wayfinder service");

        self.set_running(false).await;

        // Dropping the service also releases the server's handle on this state
        if let Some(metrics_service) = self.metrics_service.lock().await.take() {
            info!("Stopping metrics service...");
            if let Err(e) = metrics_service.stop().await {
                warn!("Failed to stop metrics service: {}", e);
            } else {
                info!("✅ Metrics service stopped");
            }
        }

        self.stop_background_tasks().await;

        info!(
            "✅ Wayfinder service shutdown completed after {}s",
            self.uptime().as_secs()
        );
        Ok(())
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn locator(&self) -> Arc<ServiceLocator> {
        self.locator.clone()
    }

    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics.clone()
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub(crate) async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    async fn start_metrics_service(self: &Arc<Self>) -> Result<(), ServiceError> {
        let health_config = HealthServerConfig {
            host: self.config.service.health_host.clone(),
            port: self.config.service.health_port,
        };
        info!(
            "Starting HTTP endpoints on {}:{}",
            health_config.host, health_config.port
        );

        let health_server = Arc::new(
            HealthServer::new(health_config, self.metrics.clone()).with_app_state(self.clone()),
        );
        let metrics_service = MetricsService::new(self.metrics.clone(), health_server);

        let server = metrics_service.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = server.start().await {
                error!("Metrics service failed: {}", e);
            } else {
                info!("Metrics service task completed");
            }
        });

        *self.metrics_service.lock().await = Some(metrics_service);
        self.background_tasks.lock().await.push(handle);

        // Give the listener a moment to bind
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        Ok(())
    }

    async fn start_background_tasks(self: &Arc<Self>) {
        info!(
            "Starting health refresh task ({}s interval)...",
            HEALTH_REFRESH_INTERVAL.as_secs()
        );

        let state = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(HEALTH_REFRESH_INTERVAL);

            while state.is_running().await {
                interval.tick().await;

                state.metrics.update_uptime(state.uptime());
                match HealthCheck::check(state.clone()).await {
                    Ok(health) => {
                        debug!("Health refreshed: {}", health.status);
                        state.metrics.update_health_status(health.status.as_gauge());
                    }
                    Err(e) => warn!("Health refresh failed: {}", e),
                }
            }

            info!("Health refresh task stopped");
        });

        self.background_tasks.lock().await.push(handle);
    }

    async fn stop_background_tasks(&self) {
        let tasks: Vec<JoinHandle<()>> = self.background_tasks.lock().await.drain(..).collect();
        info!("Stopping {} background tasks...", tasks.len());

        for task in tasks {
            task.abort();
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    error!("Background task ended with error: {}", e);
                }
            }
        }
    }
}
