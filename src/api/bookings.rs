//! Booking service client

use crate::api::{deserialize_id, MessageResponse, PlatformClient};
use crate::error::ApiError;
use crate::types::ServiceName;
use chrono::NaiveDate;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let status = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Unknown => "unknown",
        };
        write!(f, "{}", status)
    }
}

fn default_status() -> BookingStatus {
    BookingStatus::Pending
}

/// A reservation as returned by `booking-service`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(deserialize_with = "deserialize_id")]
    pub package_id: String,
    #[serde(default)]
    pub package_name: Option<String>,
    #[serde(deserialize_with = "deserialize_id")]
    pub user_id: String,
    #[serde(default)]
    pub user_email: String,
    #[serde(default)]
    pub booking_date: String,
    pub travel_date: String,
    pub participants: u32,
    #[serde(default)]
    pub total_amount: f64,
    #[serde(default = "default_status")]
    pub status: BookingStatus,
    #[serde(default)]
    pub notes: String,
}

impl Booking {
    pub fn is_cancelled(&self) -> bool {
        self.status == BookingStatus::Cancelled
    }
}

/// New reservation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub package_id: String,
    pub travel_date: NaiveDate,
    pub participants: u32,
}

impl BookingRequest {
    pub fn new(package_id: impl Into<String>, travel_date: NaiveDate, participants: u32) -> Self {
        Self {
            package_id: package_id.into(),
            travel_date,
            participants,
        }
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.package_id.trim().is_empty() {
            return Err(ApiError::InvalidInput {
                reason: "Missing required field: package_id".to_string(),
            });
        }
        if self.participants == 0 {
            return Err(ApiError::InvalidInput {
                reason: "Participants must be a positive integer".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub start_date: String,
    pub end_date: String,
}

/// Admin report over a date range. The report body is passed through as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingReport {
    pub report: Value,
    pub period: ReportPeriod,
    #[serde(default)]
    pub generated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingList {
    pub bookings: Vec<Booking>,
    #[serde(default)]
    pub total: usize,
}

#[derive(Debug, Deserialize)]
struct BookingResponse {
    booking: Booking,
}

/// Client for `booking-service`
#[derive(Clone)]
pub struct BookingClient {
    client: PlatformClient,
}

impl BookingClient {
    pub fn new(client: PlatformClient) -> Self {
        Self { client }
    }

    /// Bookings of the logged-in user
    pub async fn list(&self) -> Result<BookingList, ApiError> {
        self.client
            .call(&ServiceName::Booking, Method::GET, "/bookings", true, |r| r)
            .await
    }

    pub async fn create(&self, request: &BookingRequest) -> Result<Booking, ApiError> {
        request.validate()?;

        let response: BookingResponse = self
            .client
            .call(&ServiceName::Booking, Method::POST, "/bookings", true, |r| {
                r.json(request)
            })
            .await?;
        Ok(response.booking)
    }

    /// Cancel one of the user's bookings
    pub async fn cancel(&self, id: &str) -> Result<String, ApiError> {
        let response: MessageResponse = self
            .client
            .call(
                &ServiceName::Booking,
                Method::DELETE,
                &format!("/bookings/{}", id),
                true,
                |r| r,
            )
            .await?;
        Ok(response.message)
    }

    pub async fn report(&self, start: NaiveDate, end: NaiveDate) -> Result<BookingReport, ApiError> {
        if end < start {
            return Err(ApiError::InvalidInput {
                reason: "end_date must not precede start_date".to_string(),
            });
        }

        let query = [
            ("start_date", start.to_string()),
            ("end_date", end.to_string()),
        ];
        self.client
            .call(
                &ServiceName::Booking,
                Method::GET,
                "/bookings/report",
                true,
                |r| r.query(&query),
            )
            .await
    }
}
