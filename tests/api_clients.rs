//! End-to-end tests for the platform clients
//!
//! A mock registry points every service at a mock backend, so each request
//! goes through resolution first, as it does in production.

mod fixtures;

use chrono::NaiveDate;
use fixtures::catalog_entry;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wayfinder::api::{
    AuthClient, BookingClient, BookingRequest, BookingStatus, Credentials, PackageCatalog,
    PackageClient, PackageInput, PlatformClient, SignupRequest,
};
use wayfinder::discovery::{ConsulRegistry, LookupMode, ServiceLocator};
use wayfinder::error::{ApiError, LocatorError};
use wayfinder::metrics::MetricsCollector;
use wayfinder::types::ServiceName;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Registry and backend pair; every known service resolves to the backend
struct Platform {
    registry: MockServer,
    backend: MockServer,
}

impl Platform {
    async fn start() -> Self {
        let registry = MockServer::start().await;
        let backend = MockServer::start().await;

        let address = backend.address();
        for service in ["auth-service", "package-service", "booking-service"] {
            Mock::given(method("GET"))
                .and(path(format!("/v1/catalog/service/{}", service)))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!([catalog_entry(
                    service,
                    &address.ip().to_string(),
                    address.port()
                )])))
                .mount(&registry)
                .await;
        }

        Self { registry, backend }
    }

    fn client(&self) -> PlatformClient {
        let registry =
            ConsulRegistry::new(self.registry.uri(), LookupMode::Catalog, None).unwrap();
        let locator = Arc::new(ServiceLocator::new(Arc::new(registry)));
        PlatformClient::new(locator, Duration::from_secs(5)).unwrap()
    }

    fn authorized(&self, token: &str) -> PlatformClient {
        self.client().with_token(token)
    }
}

fn package_json(id: &str, name: &str) -> serde_json::Value {
    json!({
        "id": id,
        "name": name,
        "description": "Guided tour",
        "price": 950.0,
        "duration_days": 5,
        "max_participants": 12,
        "location": "Cusco",
        "includes": ["Hotel", "Guide"],
        "available_from": "2026-11-01",
        "available_to": "2027-03-31",
        "created_at": "2026-10-01T10:00:00",
        "updated_at": "2026-10-01T10:00:00",
        "is_active": true
    })
}

#[tokio::test]
async fn test_login_then_profile() {
    let platform = Platform::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"email": "ana@example.com", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "jwt-123"})))
        .expect(1)
        .mount(&platform.backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("authorization", "Bearer jwt-123"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "email": "ana@example.com",
            "is_admin": true
        })))
        .expect(1)
        .mount(&platform.backend)
        .await;

    let auth = AuthClient::new(platform.client());
    let session = auth
        .login_and_fetch_profile(&Credentials::new("ana@example.com", "secret"))
        .await
        .unwrap();

    assert_eq!(session.token, "jwt-123");
    let user = session.user.unwrap();
    assert_eq!(user.id, "1");
    assert!(user.is_admin);
}

#[tokio::test]
async fn test_rejected_login_carries_backend_message() {
    let platform = Platform::start().await;
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})),
        )
        .mount(&platform.backend)
        .await;

    let auth = AuthClient::new(platform.client());
    let error = auth
        .login(&Credentials::new("ana@example.com", "wrong"))
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(401));
    match error {
        ApiError::Rejected {
            service, message, ..
        } => {
            assert_eq!(service, "auth-service");
            assert_eq!(message, "Invalid credentials");
        }
        other => panic!("expected rejection, got {:?}", other),
    }
}

#[tokio::test]
async fn test_signup_validates_before_sending() {
    let platform = Platform::start().await;
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"message": "ok"})))
        .expect(0)
        .mount(&platform.backend)
        .await;

    let auth = AuthClient::new(platform.client());
    let error = auth
        .signup(&SignupRequest {
            email: "ana@example.com".to_string(),
            password: String::new(),
            is_admin: false,
        })
        .await
        .unwrap_err();

    assert!(matches!(error, ApiError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_catalog_caches_until_mutation() {
    let platform = Platform::start().await;
    Mock::given(method("GET"))
        .and(path("/packages"))
        .and(header("authorization", "Bearer admin-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "packages": [package_json("p1", "Cusco"), package_json("p2", "Patagonia")],
            "total": 2
        })))
        .mount(&platform.backend)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/packages/p1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"message": "Package deleted successfully"})),
        )
        .expect(1)
        .mount(&platform.backend)
        .await;

    let mut catalog = PackageCatalog::new(PackageClient::new(platform.authorized("admin-token")));

    let packages = catalog.load().await.unwrap();
    assert_eq!(packages.len(), 2);
    assert_eq!(catalog.cached("p2").unwrap().name, "Patagonia");

    let message = catalog.delete("p1").await.unwrap();
    assert_eq!(message, "Package deleted successfully");
    assert!(catalog.is_empty());
}

#[tokio::test]
async fn test_create_package_from_form() {
    let platform = Platform::start().await;
    Mock::given(method("POST"))
        .and(path("/packages"))
        .and(body_json(json!({
            "name": "Cusco",
            "description": "Guided tour",
            "price": 950.0,
            "duration_days": 5,
            "max_participants": 12,
            "location": "Cusco",
            "includes": ["Hotel", "Guide"]
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Package created successfully",
            "package": package_json("p9", "Cusco")
        })))
        .expect(1)
        .mount(&platform.backend)
        .await;

    let form: Vec<(String, String)> = [
        ("name", "Cusco"),
        ("description", "Guided tour"),
        ("price", "950"),
        ("duration_days", "5"),
        ("max_participants", "12"),
        ("location", "Cusco"),
        ("includes", "Hotel, Guide"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();

    let client = PackageClient::new(platform.authorized("admin-token"));
    let package = client
        .create(&PackageInput::from_form(&form).unwrap())
        .await
        .unwrap();

    assert_eq!(package.id, "p9");
}

#[tokio::test]
async fn test_public_packages_need_no_token() {
    let platform = Platform::start().await;
    Mock::given(method("GET"))
        .and(path("/packages/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "packages": [package_json("p1", "Cusco")],
            "total": 1
        })))
        .mount(&platform.backend)
        .await;

    let listing = PackageClient::new(platform.client())
        .list_public()
        .await
        .unwrap();
    assert_eq!(listing.total, 1);

    let error = PackageClient::new(platform.client()).list().await.unwrap_err();
    assert!(matches!(error, ApiError::MissingToken));
}

#[tokio::test]
async fn test_create_booking_and_report() {
    let platform = Platform::start().await;
    Mock::given(method("POST"))
        .and(path("/bookings"))
        .and(body_json(json!({
            "package_id": "p1",
            "travel_date": "2026-12-20",
            "participants": 2
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "message": "Booking created successfully",
            "booking": {
                "id": "b1",
                "package_id": "p1",
                "user_id": "7",
                "user_email": "ana@example.com",
                "booking_date": "2026-10-18T09:00:00",
                "travel_date": "2026-12-20",
                "participants": 2,
                "total_amount": 1900.0,
                "status": "pending",
                "notes": ""
            }
        })))
        .expect(1)
        .mount(&platform.backend)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings/report"))
        .and(query_param("start_date", "2026-01-01"))
        .and(query_param("end_date", "2026-12-31"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "report": {"total_bookings": 4, "total_revenue": 5200.0},
            "period": {"start_date": "2026-01-01", "end_date": "2026-12-31"},
            "generated_at": "2026-10-18T09:00:00"
        })))
        .expect(1)
        .mount(&platform.backend)
        .await;

    let client = BookingClient::new(platform.authorized("user-token"));
    let date = NaiveDate::from_ymd_opt(2026, 12, 20).unwrap();

    let booking = client
        .create(&BookingRequest::new("p1", date, 2))
        .await
        .unwrap();
    assert_eq!(booking.status, BookingStatus::Pending);
    assert_eq!(booking.total_amount, 1900.0);

    let start = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
    let end = NaiveDate::from_ymd_opt(2026, 12, 31).unwrap();
    let report = client.report(start, end).await.unwrap();
    assert_eq!(report.report["total_bookings"], 4);
    assert_eq!(report.period.end_date, "2026-12-31");

    let backwards = client.report(end, start).await.unwrap_err();
    assert!(matches!(backwards, ApiError::InvalidInput { .. }));
}

#[tokio::test]
async fn test_client_requests_are_counted() {
    let platform = Platform::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "ok", "service": "booking-service"})),
        )
        .mount(&platform.backend)
        .await;

    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let client = platform.client().with_metrics(metrics.clone());

    let health = client.health(&ServiceName::Booking).await.unwrap();
    assert_eq!(health.status, "ok");

    let count = metrics
        .client()
        .requests_total
        .with_label_values(&["booking-service", "success"])
        .get();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_unknown_service_surfaces_locator_error() {
    let registry = ConsulRegistry::new(
        "http://127.0.0.1:9",
        LookupMode::Catalog,
        Some(Duration::from_secs(2)),
    )
    .unwrap();
    let locator = Arc::new(ServiceLocator::new(Arc::new(registry)));
    let client = PlatformClient::new(locator, Duration::from_secs(2)).unwrap();

    let error = client
        .health(&ServiceName::from("payment-service"))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        ApiError::Locator(LocatorError::UnresolvableService { .. })
    ));
    assert_eq!(error.status(), None);
}
