//! Registry lookups
//!
//! `ServiceRegistry` is the seam between the locator and the catalog it
//! queries. `ConsulRegistry` talks to a Consul-compatible HTTP API.

use crate::error::RegistryError;
use crate::types::{ServiceName, ServiceRecord};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Trait for anything that can list live instances of a service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ServiceRegistry: Send + Sync {
    /// List instances for a service. An empty answer is an error.
    async fn lookup(&self, service: &ServiceName) -> Result<Vec<ServiceRecord>, RegistryError>;

    /// Check that the registry itself is answering
    async fn ping(&self) -> Result<(), RegistryError>;
}

/// Which registry endpoint a lookup uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LookupMode {
    /// `/v1/catalog/service/{name}`: every registered instance
    #[default]
    Catalog,
    /// `/v1/health/service/{name}?passing=true`: only instances passing checks
    HealthPassing,
}

impl FromStr for LookupMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "catalog" => Ok(LookupMode::Catalog),
            "health-passing" | "health_passing" | "health" => Ok(LookupMode::HealthPassing),
            _ => Err(anyhow!(
                "Invalid lookup mode '{}'. Use 'catalog' or 'health-passing'",
                s
            )),
        }
    }
}

impl fmt::Display for LookupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LookupMode::Catalog => write!(f, "catalog"),
            LookupMode::HealthPassing => write!(f, "health-passing"),
        }
    }
}

/// Entry of the health endpoint; the instance is nested under `Service`
#[derive(Debug, Deserialize)]
struct HealthEntry {
    #[serde(rename = "Node", default)]
    node: HealthNode,
    #[serde(rename = "Service")]
    service: HealthService,
}

#[derive(Debug, Default, Deserialize)]
struct HealthNode {
    #[serde(rename = "Node", default)]
    name: String,
    #[serde(rename = "Address", default)]
    address: String,
}

#[derive(Debug, Deserialize)]
struct HealthService {
    #[serde(rename = "ID", default)]
    id: String,
    #[serde(rename = "Service", default)]
    name: String,
    #[serde(rename = "Address", default)]
    address: String,
    #[serde(rename = "Port")]
    port: u16,
    #[serde(rename = "Tags", default)]
    tags: Option<Vec<String>>,
}

impl From<HealthEntry> for ServiceRecord {
    fn from(entry: HealthEntry) -> Self {
        Self {
            service_address: entry.service.address,
            service_port: entry.service.port,
            node_address: entry.node.address,
            node: entry.node.name,
            service_id: entry.service.id,
            service_name: entry.service.name,
            service_tags: entry.service.tags.unwrap_or_default(),
        }
    }
}

/// Parse a catalog or health answer into records
pub fn parse_lookup_body(
    mode: LookupMode,
    service: &ServiceName,
    body: &str,
) -> Result<Vec<ServiceRecord>, RegistryError> {
    let malformed = |e: serde_json::Error| RegistryError::MalformedResponse {
        service: service.to_string(),
        reason: e.to_string(),
    };

    let records: Vec<ServiceRecord> = match mode {
        LookupMode::Catalog => serde_json::from_str(body).map_err(malformed)?,
        LookupMode::HealthPassing => serde_json::from_str::<Vec<HealthEntry>>(body)
            .map_err(malformed)?
            .into_iter()
            .map(ServiceRecord::from)
            .collect(),
    };

    if records.is_empty() {
        return Err(RegistryError::NoInstances {
            service: service.to_string(),
        });
    }

    Ok(records)
}

/// Consul-compatible HTTP registry client
#[derive(Debug, Clone)]
pub struct ConsulRegistry {
    client: reqwest::Client,
    base_url: String,
    mode: LookupMode,
}

impl ConsulRegistry {
    /// Create a client for a registry at `base_url` (e.g. `http://consul:8500`)
    pub fn new(base_url: impl Into<String>, mode: LookupMode, timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Failed to build registry HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            mode,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn mode(&self) -> LookupMode {
        self.mode
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// URL queried for a service under the configured lookup mode
    pub fn lookup_url(&self, service: &ServiceName) -> String {
        match self.mode {
            LookupMode::Catalog => format!("{}/v1/catalog/service/{}", self.base_url, service),
            LookupMode::HealthPassing => format!(
                "{}/v1/health/service/{}?passing=true",
                self.base_url, service
            ),
        }
    }
}

#[async_trait]
impl ServiceRegistry for ConsulRegistry {
    async fn lookup(&self, service: &ServiceName) -> Result<Vec<ServiceRecord>, RegistryError> {
        let url = self.lookup_url(service);
        debug!("Querying registry: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::UnexpectedStatus {
                service: service.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| RegistryError::Unreachable {
                message: e.to_string(),
            })?;

        let records = parse_lookup_body(self.mode, service, &body)?;
        debug!("Registry returned {} instance(s) for {}", records.len(), service);
        Ok(records)
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        let url = format!("{}/v1/status/leader", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| RegistryError::Unreachable {
                message: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(RegistryError::UnexpectedStatus {
                service: "registry".to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(())
    }
}
