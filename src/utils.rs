//! Utility functions shared across the crate

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a unique registry ID for a service instance
pub fn generate_instance_id(service_name: &str) -> String {
    format!("{}-{}", service_name, Uuid::new_v4())
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Split a comma separated list, trimming items and dropping empty ones
pub fn split_comma_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}
