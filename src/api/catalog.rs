//! In-process package cache
//!
//! The cache is owned by whoever builds it. `load` fills it from the package
//! listing and every successful mutation empties it, so a stale entry never
//! outlives a write made through the same catalog.

use crate::api::packages::{PackageClient, PackageInput, TravelPackage};
use crate::error::ApiError;
use std::collections::HashMap;
use tracing::debug;

pub struct PackageCatalog {
    client: PackageClient,
    cache: HashMap<String, TravelPackage>,
}

impl PackageCatalog {
    pub fn new(client: PackageClient) -> Self {
        Self {
            client,
            cache: HashMap::new(),
        }
    }

    /// Replace the cache with the current package listing
    pub async fn load(&mut self) -> Result<Vec<TravelPackage>, ApiError> {
        let listing = self.client.list().await?;

        self.cache = listing
            .packages
            .iter()
            .map(|package| (package.id.clone(), package.clone()))
            .collect();
        debug!("Package cache loaded with {} entries", self.cache.len());

        Ok(listing.packages)
    }

    pub fn cached(&self, id: &str) -> Option<&TravelPackage> {
        self.cache.get(id)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub async fn create(&mut self, input: &PackageInput) -> Result<TravelPackage, ApiError> {
        let package = self.client.create(input).await?;
        self.invalidate();
        Ok(package)
    }

    pub async fn update(
        &mut self,
        id: &str,
        input: &PackageInput,
    ) -> Result<TravelPackage, ApiError> {
        let package = self.client.update(id, input).await?;
        self.invalidate();
        Ok(package)
    }

    pub async fn delete(&mut self, id: &str) -> Result<String, ApiError> {
        let message = self.client.delete(id).await?;
        self.invalidate();
        Ok(message)
    }

    pub fn invalidate(&mut self) {
        if !self.cache.is_empty() {
            debug!("Package cache invalidated");
        }
        self.cache.clear();
    }
}
