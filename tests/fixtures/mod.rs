//! Test fixtures shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use wayfinder::error::RegistryError;
use wayfinder::types::{ServiceName, ServiceRecord};
use wayfinder::ServiceRegistry;

/// Registry double with a fixed answer per service. Services without an
/// answer are reported as having no instances.
#[derive(Debug, Default)]
pub struct ScriptedRegistry {
    answers: Mutex<HashMap<String, Result<Vec<ServiceRecord>, RegistryError>>>,
    lookups: AtomicUsize,
    unreachable: bool,
}

impl ScriptedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose every call fails as if the host were down
    pub fn down() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_instances(self, service: &str, records: Vec<ServiceRecord>) -> Self {
        self.set_answer(service, Ok(records));
        self
    }

    pub fn with_error(self, service: &str, error: RegistryError) -> Self {
        self.set_answer(service, Err(error));
        self
    }

    pub fn set_answer(&self, service: &str, answer: Result<Vec<ServiceRecord>, RegistryError>) {
        if let Ok(mut answers) = self.answers.lock() {
            answers.insert(service.to_string(), answer);
        }
    }

    /// Number of lookups served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ServiceRegistry for ScriptedRegistry {
    async fn lookup(&self, service: &ServiceName) -> Result<Vec<ServiceRecord>, RegistryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);

        if self.unreachable {
            return Err(RegistryError::Unreachable {
                message: "connection refused".to_string(),
            });
        }

        self.answers
            .lock()
            .ok()
            .and_then(|answers| answers.get(service.as_str()).cloned())
            .unwrap_or_else(|| {
                Err(RegistryError::NoInstances {
                    service: service.to_string(),
                })
            })
    }

    async fn ping(&self) -> Result<(), RegistryError> {
        if self.unreachable {
            Err(RegistryError::Unreachable {
                message: "connection refused".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

/// Shared handle, for tests that keep inspecting the registry
pub fn shared(registry: ScriptedRegistry) -> Arc<ScriptedRegistry> {
    Arc::new(registry)
}

/// Catalog record as the registry would return it
pub fn record(address: &str, port: u16) -> ServiceRecord {
    ServiceRecord::new(address, port)
}

/// One catalog entry in the registry's JSON shape
pub fn catalog_entry(service: &str, address: &str, port: u16) -> Value {
    json!({
        "ID": "40e4a748-2192-161a-0510-9bf59fe950b5",
        "Node": "node-1",
        "Address": "10.1.10.12",
        "Datacenter": "dc1",
        "ServiceID": format!("{}-1", service),
        "ServiceName": service,
        "ServiceTags": ["microservice"],
        "ServiceAddress": address,
        "ServicePort": port
    })
}

/// One health entry in the registry's JSON shape
pub fn health_entry(service: &str, address: &str, port: u16) -> Value {
    json!({
        "Node": { "Node": "node-1", "Address": "10.1.10.12" },
        "Service": {
            "ID": format!("{}-1", service),
            "Service": service,
            "Tags": ["microservice"],
            "Address": address,
            "Port": port
        },
        "Checks": [{ "Status": "passing" }]
    })
}
