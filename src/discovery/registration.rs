//! Registering service instances with the registry agent
//!
//! Backends announce themselves with an HTTP health check so the registry
//! can drop them once they stop answering.

use crate::discovery::registry::ConsulRegistry;
use crate::error::RegistryError;
use crate::utils::generate_instance_id;
use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;
use tracing::{error, info, warn};

/// HTTP health check attached to a registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentCheck {
    #[serde(rename = "HTTP")]
    pub http: String,
    #[serde(rename = "Interval")]
    pub interval: String,
    #[serde(rename = "Timeout")]
    pub timeout: String,
    #[serde(rename = "DeregisterCriticalServiceAfter")]
    pub deregister_critical_service_after: String,
}

impl AgentCheck {
    /// Default check against `http://{address}:{port}/health`
    pub fn http_health(address: &str, port: u16) -> Self {
        Self {
            http: format!("http://{}:{}/health", address, port),
            interval: "10s".to_string(),
            timeout: "5s".to_string(),
            deregister_critical_service_after: "30s".to_string(),
        }
    }
}

/// Agent registration payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Address")]
    pub address: String,
    #[serde(rename = "Port")]
    pub port: u16,
    #[serde(rename = "Tags", default)]
    pub tags: Vec<String>,
    #[serde(rename = "Check", skip_serializing_if = "Option::is_none")]
    pub check: Option<AgentCheck>,
}

impl ServiceRegistration {
    /// Registration with the default HTTP health check
    pub fn new(name: impl Into<String>, id: impl Into<String>, address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        Self {
            name: name.into(),
            id: id.into(),
            check: Some(AgentCheck::http_health(&address, port)),
            address,
            port,
            tags: Vec::new(),
        }
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn without_check(mut self) -> Self {
        self.check = None;
        self
    }

    /// Registration built from `SERVICE_NAME`, `SERVICE_ID`, `SERVICE_HOST`
    /// and `SERVICE_PORT`, defaulting to the first booking-service instance
    pub fn from_env(generate_id: bool) -> anyhow::Result<Self> {
        let name = env::var("SERVICE_NAME").unwrap_or_else(|_| "booking-service".to_string());
        let id = match env::var("SERVICE_ID") {
            Ok(id) => id,
            Err(_) if generate_id => generate_instance_id(&name),
            Err(_) => format!("{}-1", name),
        };
        let address = env::var("SERVICE_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port = match env::var("SERVICE_PORT") {
            Ok(port) => port
                .parse()
                .map_err(|_| anyhow!("Invalid SERVICE_PORT value: {}", port))?,
            Err(_) => 5003,
        };

        Ok(Self::new(name, id, address, port).with_tags(vec![
            "bookings".to_string(),
            "microservice".to_string(),
            "api".to_string(),
        ]))
    }
}

/// Trait for registries that accept agent registrations
#[async_trait]
pub trait ServiceRegistrar: Send + Sync {
    async fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError>;

    async fn deregister(&self, service_id: &str) -> Result<(), RegistryError>;
}

#[async_trait]
impl ServiceRegistrar for ConsulRegistry {
    async fn register(&self, registration: &ServiceRegistration) -> Result<(), RegistryError> {
        let url = format!("{}/v1/agent/service/register", self.base_url());
        let response = self
            .http()
            .put(&url)
            .json(registration)
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RegistryError::UnexpectedStatus {
                service: registration.name.clone(),
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }

    async fn deregister(&self, service_id: &str) -> Result<(), RegistryError> {
        let url = format!(
            "{}/v1/agent/service/deregister/{}",
            self.base_url(),
            service_id
        );
        let response = self
            .http()
            .put(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RegistryError::UnexpectedStatus {
                service: service_id.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}

/// Tracks one registration so it can be withdrawn exactly once
pub struct RegistrationGuard<R: ServiceRegistrar> {
    registrar: R,
    registration: ServiceRegistration,
    is_registered: bool,
}

impl<R: ServiceRegistrar> RegistrationGuard<R> {
    pub fn new(registrar: R, registration: ServiceRegistration) -> Self {
        Self {
            registrar,
            registration,
            is_registered: false,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.is_registered
    }

    pub fn registration(&self) -> &ServiceRegistration {
        &self.registration
    }

    /// Register the instance. Failures are logged and returned.
    pub async fn register(&mut self) -> Result<(), RegistryError> {
        match self.registrar.register(&self.registration).await {
            Ok(()) => {
                self.is_registered = true;
                info!(
                    "Service {} registered with ID {}",
                    self.registration.name, self.registration.id
                );
                Ok(())
            }
            Err(e) => {
                error!("Error registering service {}: {}", self.registration.name, e);
                Err(e)
            }
        }
    }

    /// Withdraw the instance if it is registered; otherwise a no-op
    pub async fn deregister(&mut self) -> Result<(), RegistryError> {
        if !self.is_registered {
            return Ok(());
        }

        match self.registrar.deregister(&self.registration.id).await {
            Ok(()) => {
                self.is_registered = false;
                info!("Service {} deregistered", self.registration.id);
                Ok(())
            }
            Err(e) => {
                warn!("Error deregistering service {}: {}", self.registration.id, e);
                Err(e)
            }
        }
    }
}
