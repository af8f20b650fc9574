//! Common types used throughout the service locator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical name of a backend service
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ServiceName {
    Auth,
    Package,
    Booking,
    /// Any name outside the known set; passed through to the registry as-is
    Other(String),
}

impl ServiceName {
    /// The services the platform ships with
    pub const KNOWN: [ServiceName; 3] = [ServiceName::Auth, ServiceName::Package, ServiceName::Booking];

    /// Registry identifier for this service
    pub fn as_str(&self) -> &str {
        match self {
            ServiceName::Auth => "auth-service",
            ServiceName::Package => "package-service",
            ServiceName::Booking => "booking-service",
            ServiceName::Other(name) => name,
        }
    }

    /// Whether this is one of the platform's own services
    pub fn is_known(&self) -> bool {
        !matches!(self, ServiceName::Other(_))
    }
}

impl From<&str> for ServiceName {
    fn from(name: &str) -> Self {
        match name {
            "auth-service" => ServiceName::Auth,
            "package-service" => ServiceName::Package,
            "booking-service" => ServiceName::Booking,
            other => ServiceName::Other(other.to_string()),
        }
    }
}

impl From<String> for ServiceName {
    fn from(name: String) -> Self {
        ServiceName::from(name.as_str())
    }
}

impl FromStr for ServiceName {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ServiceName::from(s))
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ServiceName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServiceName {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(ServiceName::from(name))
    }
}

/// One registered instance of a service, as returned by the catalog endpoint
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceRecord {
    #[serde(rename = "ServiceAddress", default)]
    pub service_address: String,
    #[serde(rename = "ServicePort")]
    pub service_port: u16,
    /// Node address, used when the service registered without its own address
    #[serde(rename = "Address", default)]
    pub node_address: String,
    #[serde(rename = "Node", default)]
    pub node: String,
    #[serde(rename = "ServiceID", default)]
    pub service_id: String,
    #[serde(rename = "ServiceName", default)]
    pub service_name: String,
    #[serde(rename = "ServiceTags", default)]
    pub service_tags: Vec<String>,
}

impl ServiceRecord {
    /// Create a record with just an address and port
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            service_address: address.into(),
            service_port: port,
            ..Default::default()
        }
    }

    /// Address clients should connect to
    pub fn effective_address(&self) -> Option<&str> {
        [self.service_address.as_str(), self.node_address.as_str()]
            .into_iter()
            .map(str::trim)
            .find(|address| !address.is_empty())
    }
}

/// Base URL of a reachable service instance
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolvedUrl(String);

impl ResolvedUrl {
    /// Compose `http://{address}:{port}` from a registry record
    pub fn from_record(record: &ServiceRecord) -> Result<Self, String> {
        let address = record
            .effective_address()
            .ok_or_else(|| "record has no service or node address".to_string())?;

        if record.service_port == 0 {
            return Err(format!("record for {} has port 0", address));
        }

        let host = if address.contains(':') && !address.starts_with('[') {
            format!("[{}]", address)
        } else {
            address.to_string()
        };

        Ok(Self(format!("http://{}:{}", host, record.service_port)))
    }

    /// Parse a configured base URL
    pub fn parse(url: &str) -> Result<Self, String> {
        let trimmed = url.trim().trim_end_matches('/');
        let rest = trimmed
            .strip_prefix("http://")
            .or_else(|| trimmed.strip_prefix("https://"))
            .ok_or_else(|| format!("URL must start with http:// or https://: {}", url))?;

        if rest.is_empty() || rest.contains('/') {
            return Err(format!("URL must be a bare scheme://host:port: {}", url));
        }

        let (host, port) = rest
            .rsplit_once(':')
            .ok_or_else(|| format!("URL is missing a port: {}", url))?;
        let bracketed = host.starts_with('[') && host.ends_with(']') && host.len() > 2;
        if host.is_empty() || (host.contains(':') && !bracketed) {
            return Err(format!("URL has an invalid host: {}", url));
        }
        match port.parse::<u16>() {
            Ok(port) if port > 0 => {}
            _ => return Err(format!("URL has an invalid port: {}", url)),
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Build a full URL for a path on this service
    pub fn join(&self, path: &str) -> String {
        format!("{}/{}", self.0, path.trim_start_matches('/'))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResolvedUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a resolved URL came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Registry,
    Fallback,
}

impl ResolutionSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionSource::Registry => "registry",
            ResolutionSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ResolutionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single resolve call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub service: ServiceName,
    pub url: ResolvedUrl,
    pub source: ResolutionSource,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_name_round_trip() {
        for name in ServiceName::KNOWN {
            assert!(name.is_known());
            assert_eq!(ServiceName::from(name.as_str()), name);
        }

        let other: ServiceName = "payment-service".parse().unwrap();
        assert_eq!(other, ServiceName::Other("payment-service".to_string()));
        assert!(!other.is_known());
        assert_eq!(other.to_string(), "payment-service");
    }

    #[test]
    fn test_record_from_catalog_json() {
        let json = r#"[{"ServiceAddress":"10.0.0.5","ServicePort":5000}]"#;
        let records: Vec<ServiceRecord> = serde_json::from_str(json).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].effective_address(), Some("10.0.0.5"));
        assert_eq!(
            ResolvedUrl::from_record(&records[0]).unwrap().as_str(),
            "http://10.0.0.5:5000"
        );
    }

    #[test]
    fn test_record_uses_node_address_when_service_address_empty() {
        let record = ServiceRecord {
            node_address: "192.168.1.20".to_string(),
            service_port: 5002,
            ..Default::default()
        };

        assert_eq!(
            ResolvedUrl::from_record(&record).unwrap().as_str(),
            "http://192.168.1.20:5002"
        );
    }

    #[test]
    fn test_record_without_address_is_rejected() {
        let record = ServiceRecord::new("  ", 5000);
        assert!(ResolvedUrl::from_record(&record).is_err());

        let zero_port = ServiceRecord::new("10.0.0.5", 0);
        assert!(ResolvedUrl::from_record(&zero_port).is_err());
    }

    #[test]
    fn test_ipv6_address_is_bracketed() {
        let record = ServiceRecord::new("fd00::5", 5003);
        assert_eq!(
            ResolvedUrl::from_record(&record).unwrap().as_str(),
            "http://[fd00::5]:5003"
        );
    }

    #[test]
    fn test_parse_and_join() {
        let url = ResolvedUrl::parse("http://auth-service:5000/").unwrap();
        assert_eq!(url.as_str(), "http://auth-service:5000");
        assert_eq!(url.join("/login"), "http://auth-service:5000/login");
        assert_eq!(url.join("me"), "http://auth-service:5000/me");

        assert!(ResolvedUrl::parse("auth-service:5000").is_err());
        assert!(ResolvedUrl::parse("http://").is_err());
        assert!(ResolvedUrl::parse("http://host:1/path").is_err());
    }

    #[test]
    fn test_parse_requires_port() {
        assert!(ResolvedUrl::parse("http://auth-service").is_err());
        assert!(ResolvedUrl::parse("http://auth-service:").is_err());
        assert!(ResolvedUrl::parse("http://auth-service:0").is_err());
        assert!(ResolvedUrl::parse("http://auth-service:70000").is_err());
        assert!(ResolvedUrl::parse("http://:5000").is_err());
        assert!(ResolvedUrl::parse("http://::1:5000").is_err());

        let ipv6 = ResolvedUrl::parse("http://[::1]:5000").unwrap();
        assert_eq!(ipv6.as_str(), "http://[::1]:5000");
    }

    #[test]
    fn test_resolution_serializes_lowercase_source() {
        let resolution = Resolution {
            service: ServiceName::Booking,
            url: ResolvedUrl::parse("http://booking-service:5003").unwrap(),
            source: ResolutionSource::Fallback,
        };

        let json = serde_json::to_value(&resolution).unwrap();
        assert_eq!(json["service"], "booking-service");
        assert_eq!(json["url"], "http://booking-service:5003");
        assert_eq!(json["source"], "fallback");
    }
}
