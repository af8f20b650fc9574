//! Static fallback URLs used when the registry cannot answer
//!
//! The compiled-in table covers the three platform services. Configuration
//! can add entries for other names or point a known service elsewhere.

use crate::types::{ResolvedUrl, ServiceName};
use anyhow::{anyhow, Result};
use std::collections::BTreeMap;

/// Compiled-in fallback URLs for the platform services
pub const DEFAULT_FALLBACKS: [(&str, &str); 3] = [
    ("auth-service", "http://auth-service:5000"),
    ("package-service", "http://package-service:5002"),
    ("booking-service", "http://booking-service:5003"),
];

/// Mapping from service name to a fixed base URL
#[derive(Debug, Clone, PartialEq)]
pub struct FallbackTable {
    entries: BTreeMap<ServiceName, ResolvedUrl>,
}

impl FallbackTable {
    /// Table with only the compiled-in entries
    pub fn new() -> Self {
        let entries = DEFAULT_FALLBACKS
            .iter()
            .map(|(name, url)| {
                (
                    ServiceName::from(*name),
                    ResolvedUrl::parse(url).expect("compiled-in fallback URLs are valid"),
                )
            })
            .collect();

        Self { entries }
    }

    /// Table with no entries at all
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Compiled-in entries plus configured overrides
    pub fn with_overrides<'a, I>(overrides: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a String, &'a String)>,
    {
        let mut table = Self::new();
        for (name, url) in overrides {
            table.insert(ServiceName::from(name.as_str()), url)?;
        }
        Ok(table)
    }

    /// Add or replace an entry
    pub fn insert(&mut self, service: ServiceName, url: &str) -> Result<()> {
        let url = ResolvedUrl::parse(url)
            .map_err(|reason| anyhow!("Invalid fallback URL for {}: {}", service, reason))?;
        self.entries.insert(service, url);
        Ok(())
    }

    /// Fallback URL for a service, if one is configured
    pub fn get(&self, service: &ServiceName) -> Option<&ResolvedUrl> {
        self.entries.get(service)
    }

    pub fn contains(&self, service: &ServiceName) -> bool {
        self.entries.contains_key(service)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in name order
    pub fn iter(&self) -> impl Iterator<Item = (&ServiceName, &ResolvedUrl)> {
        self.entries.iter()
    }
}

impl Default for FallbackTable {
    fn default() -> Self {
        Self::new()
    }
}
