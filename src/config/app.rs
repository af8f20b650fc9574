//! Main application configuration
//!
//! This module defines the configuration structures for the locator and
//! the platform clients, including environment variable loading, TOML file
//! loading and validation.

use crate::discovery::{FallbackTable, LookupMode, SelectionPolicy};
use crate::types::ResolvedUrl;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub registry: RegistrySettings,
    /// Extra or replacement fallback URLs keyed by service name
    pub fallback: BTreeMap<String, String>,
    pub client: ClientSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Host the serve mode binds to
    pub health_host: String,
    /// Port for the health, metrics and resolve endpoints
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Registry connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Scheme used to reach the registry (http or https)
    pub scheme: String,
    /// Registry host
    pub host: String,
    /// Registry port
    pub port: u16,
    /// Catalog or health-passing lookups
    pub lookup_mode: LookupMode,
    /// Instance selection policy
    pub selection_policy: SelectionPolicy,
    /// Optional per-request timeout in milliseconds; unset leaves it to the
    /// network stack
    pub timeout_ms: Option<u64>,
}

/// Settings for the auth, package and booking clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Where the login session is stored; defaults under the home directory
    pub session_file: Option<PathBuf>,
    /// Backend request timeout in seconds
    pub request_timeout_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "wayfinder".to_string(),
            log_level: "info".to_string(),
            health_host: "0.0.0.0".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            scheme: "http".to_string(),
            host: "consul".to_string(),
            port: 8500,
            lookup_mode: LookupMode::Catalog,
            selection_policy: SelectionPolicy::First,
            timeout_ms: None,
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            session_file: None,
            request_timeout_seconds: 30,
        }
    }
}

impl RegistrySettings {
    /// Registry base URL, e.g. `http://consul:8500`
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("Invalid {} value: {}", key, value))
}

/// `FALLBACK_PACKAGE_SERVICE_URL` -> `package-service`
fn fallback_service_from_var(key: &str) -> Option<String> {
    let name = key.strip_prefix("FALLBACK_")?.strip_suffix("_URL")?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_lowercase().replace('_', "-"))
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        Self::from_vars(env::vars())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars<I>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars.into_iter().collect();
        let mut config = Self::default();

        // Service settings
        if let Some(name) = vars.get("SERVICE_NAME") {
            config.service.name = name.clone();
        }
        if let Some(log_level) = vars.get("LOG_LEVEL") {
            config.service.log_level = log_level.clone();
        }
        if let Some(host) = vars.get("HEALTH_HOST") {
            config.service.health_host = host.clone();
        }
        if let Some(port) = vars.get("HEALTH_PORT") {
            config.service.health_port = parse_var("HEALTH_PORT", port)?;
        }
        if let Some(timeout) = vars.get("SHUTDOWN_TIMEOUT_SECONDS") {
            config.service.shutdown_timeout_seconds =
                parse_var("SHUTDOWN_TIMEOUT_SECONDS", timeout)?;
        }

        // Registry settings
        if let Some(scheme) = vars.get("REGISTRY_SCHEME") {
            config.registry.scheme = scheme.to_lowercase();
        }
        if let Some(host) = vars.get("CONSUL_HOST") {
            config.registry.host = host.clone();
        }
        if let Some(port) = vars.get("CONSUL_PORT") {
            config.registry.port = parse_var("CONSUL_PORT", port)?;
        }
        if let Some(mode) = vars.get("REGISTRY_LOOKUP_MODE") {
            config.registry.lookup_mode = mode.parse()?;
        }
        if let Some(policy) = vars.get("SELECTION_POLICY") {
            config.registry.selection_policy = policy.parse()?;
        }
        if let Some(timeout) = vars.get("REGISTRY_TIMEOUT_MS") {
            config.registry.timeout_ms = Some(parse_var("REGISTRY_TIMEOUT_MS", timeout)?);
        }

        // Fallback overrides
        for (key, value) in &vars {
            if let Some(service) = fallback_service_from_var(key) {
                config.fallback.insert(service, value.clone());
            }
        }

        // Client settings
        if let Some(path) = vars.get("SESSION_FILE") {
            config.client.session_file = Some(PathBuf::from(path));
        }
        if let Some(timeout) = vars.get("REQUEST_TIMEOUT_SECONDS") {
            config.client.request_timeout_seconds = parse_var("REQUEST_TIMEOUT_SECONDS", timeout)?;
        }

        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Fallback table with configured overrides applied
    pub fn fallback_table(&self) -> Result<FallbackTable> {
        FallbackTable::with_overrides(&self.fallback)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get registry request timeout, if one is configured
    pub fn registry_timeout(&self) -> Option<Duration> {
        self.registry.timeout_ms.map(Duration::from_millis)
    }

    /// Get backend request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.client.request_timeout_seconds)
    }

    /// Session file location, defaulting to `$HOME/.wayfinder/session.json`
    pub fn session_path(&self) -> PathBuf {
        match &self.client.session_file {
            Some(path) => path.clone(),
            None => env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".wayfinder")
                .join("session.json"),
        }
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }
    if config.registry.port == 0 {
        return Err(anyhow!("Registry port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }
    if config.registry.timeout_ms == Some(0) {
        return Err(anyhow!("Registry timeout must be greater than 0 when set"));
    }
    if config.client.request_timeout_seconds == 0 {
        return Err(anyhow!("Request timeout must be greater than 0"));
    }

    // Validate registry settings
    if config.registry.host.trim().is_empty() {
        return Err(anyhow!("Registry host cannot be empty"));
    }
    match config.registry.scheme.as_str() {
        "http" | "https" => {}
        other => return Err(anyhow!("Invalid registry scheme: {}", other)),
    }

    // Validate fallback URLs
    for (service, url) in &config.fallback {
        if service.trim().is_empty() {
            return Err(anyhow!("Fallback service name cannot be empty"));
        }
        ResolvedUrl::parse(url)
            .map_err(|reason| anyhow!("Invalid fallback URL for {}: {}", service, reason))?;
    }

    Ok(())
}
