//! Package service client and the package form model

use crate::api::{deserialize_id, MessageResponse, PlatformClient};
use crate::error::ApiError;
use crate::types::ServiceName;
use crate::utils::split_comma_list;
use chrono::NaiveDate;
use reqwest::Method;
use serde::{Deserialize, Serialize};

/// A travel package as stored by `package-service`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TravelPackage {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub duration_days: u32,
    pub max_participants: u32,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub available_from: String,
    #[serde(default)]
    pub available_to: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Body of create and update requests
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackageInput {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub duration_days: u32,
    pub max_participants: u32,
    pub location: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_to: Option<NaiveDate>,
}

impl PackageInput {
    /// Build an input from `key=value` form pairs. Numeric fields are parsed,
    /// `includes` is split on commas and unknown keys are ignored.
    pub fn from_form(pairs: &[(String, String)]) -> Result<Self, ApiError> {
        let mut input = PackageInput::default();

        for (key, value) in pairs {
            let value = value.trim();
            match key.as_str() {
                "name" => input.name = value.to_string(),
                "description" => input.description = value.to_string(),
                "location" => input.location = value.to_string(),
                "price" => input.price = parse_field(key, value)?,
                "duration_days" => input.duration_days = parse_field(key, value)?,
                "max_participants" => input.max_participants = parse_field(key, value)?,
                "includes" => input.includes = split_comma_list(value),
                "available_from" => input.available_from = parse_date(key, value)?,
                "available_to" => input.available_to = parse_date(key, value)?,
                _ => {}
            }
        }

        Ok(input)
    }

    /// Check the fields the backend would reject
    pub fn validate(&self) -> Result<(), ApiError> {
        let invalid = |reason: &str| {
            Err(ApiError::InvalidInput {
                reason: reason.to_string(),
            })
        };

        if self.name.trim().is_empty() {
            return invalid("Missing required field: name");
        }
        if self.description.trim().is_empty() {
            return invalid("Missing required field: description");
        }
        if self.location.trim().is_empty() {
            return invalid("Missing required field: location");
        }
        if self.price.is_nan() || self.price <= 0.0 {
            return invalid("Price must be a positive number");
        }
        if self.duration_days == 0 {
            return invalid("Duration days must be a positive integer");
        }
        if self.max_participants == 0 {
            return invalid("Max participants must be a positive integer");
        }
        if let (Some(from), Some(to)) = (self.available_from, self.available_to) {
            if to < from {
                return invalid("available_to must not precede available_from");
            }
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ApiError> {
    value.parse().map_err(|_| ApiError::InvalidInput {
        reason: format!("Invalid number for {}: '{}'", key, value),
    })
}

fn parse_date(key: &str, value: &str) -> Result<Option<NaiveDate>, ApiError> {
    if value.is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map(Some)
        .map_err(|_| ApiError::InvalidInput {
            reason: format!("Invalid date for {}: '{}' (expected YYYY-MM-DD)", key, value),
        })
}

/// `{packages, total}` listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageList {
    pub packages: Vec<TravelPackage>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Deserialize)]
struct PackageResponse {
    package: TravelPackage,
}

/// Client for `package-service`
#[derive(Clone)]
pub struct PackageClient {
    client: PlatformClient,
}

impl PackageClient {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    /// All packages, for any authenticated user
    pub async fn list(&self) -> Result<PackageList, ApiError> {
        self.client
            .call(&ServiceName::Package, Method::GET, "/packages", true, |r| r)
            .await
    }

    /// Packages currently on sale, no login needed
    pub async fn list_public(&self) -> Result<PackageList, ApiError> {
        self.client
            .call(
                &ServiceName::Package,
                Method::GET,
                "/packages/public",
                false,
                |r| r,
            )
            .await
    }

    pub async fn get(&self, id: &str) -> Result<TravelPackage, ApiError> {
        self.client
            .call(
                &ServiceName::Package,
                Method::GET,
                &format!("/packages/{}", id),
                false,
                |r| r,
            )
            .await
    }

    /// Create a package (admin only on the backend)
    pub async fn create(&self, input: &PackageInput) -> Result<TravelPackage, ApiError> {
        input.validate()?;

        let response: PackageResponse = self
            .client
            .call(&ServiceName::Package, Method::POST, "/packages", true, |r| {
                r.json(input)
            })
            .await?;
        Ok(response.package)
    }

    pub async fn update(&self, id: &str, input: &PackageInput) -> Result<TravelPackage, ApiError> {
        input.validate()?;

        let response: PackageResponse = self
            .client
            .call(
                &ServiceName::Package,
                Method::PUT,
                &format!("/packages/{}", id),
                true,
                |r| r.json(input),
            )
            .await?;
        Ok(response.package)
    }

    pub async fn delete(&self, id: &str) -> Result<String, ApiError> {
        let response: MessageResponse = self
            .client
            .call(
                &ServiceName::Package,
                Method::DELETE,
                &format!("/packages/{}", id),
                true,
                |r| r,
            )
            .await?;
        Ok(response.message)
    }
}
