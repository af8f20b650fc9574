//! Integration tests for the wayfinder service locator
//!
//! These tests drive the locator through scripted registries:
//! - Registry answers and URL composition
//! - Fallback on every kind of registry failure
//! - Unknown services with and without a fallback
//! - Selection policies under concurrent callers

mod fixtures;

use fixtures::{record, shared, ScriptedRegistry};
use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use wayfinder::config::AppConfig;
use wayfinder::discovery::{FallbackTable, SelectionPolicy, ServiceLocator};
use wayfinder::error::{LocatorError, RegistryError};
use wayfinder::metrics::MetricsCollector;
use wayfinder::types::{ResolutionSource, ResolvedUrl, ServiceName, ServiceRecord};

#[tokio::test]
async fn test_registry_answer_becomes_base_url() {
    let registry = shared(
        ScriptedRegistry::new().with_instances("auth-service", vec![record("10.0.0.5", 5000)]),
    );
    let locator = ServiceLocator::new(registry.clone());

    let url = locator.resolve(&ServiceName::Auth).await.unwrap();

    assert_eq!(url.as_str(), "http://10.0.0.5:5000");
    assert_eq!(registry.lookups(), 1);
}

#[tokio::test]
async fn test_every_call_queries_the_registry() {
    let registry = shared(
        ScriptedRegistry::new().with_instances("package-service", vec![record("10.0.0.7", 5002)]),
    );
    let locator = ServiceLocator::new(registry.clone());

    locator.resolve(&ServiceName::Package).await.unwrap();

    // The instance moves; the next call sees the new address
    registry.set_answer("package-service", Ok(vec![record("10.0.0.8", 6002)]));
    let url = locator.resolve(&ServiceName::Package).await.unwrap();

    assert_eq!(url.as_str(), "http://10.0.0.8:6002");
    assert_eq!(registry.lookups(), 2);
}

#[tokio::test]
async fn test_resolve_is_idempotent() {
    let registry = ScriptedRegistry::new().with_instances(
        "auth-service",
        vec![
            record("10.0.0.5", 5000),
            record("10.0.0.6", 5000),
            record("10.0.0.7", 5000),
        ],
    );
    let locator = ServiceLocator::new(shared(registry));

    let first = locator.resolve(&ServiceName::Auth).await.unwrap();
    let second = locator.resolve(&ServiceName::Auth).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_str(), "http://10.0.0.5:5000");

    let locator = ServiceLocator::new(shared(ScriptedRegistry::down()));

    let first = locator.resolve(&ServiceName::Booking).await.unwrap();
    let second = locator.resolve(&ServiceName::Booking).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_str(), "http://booking-service:5003");
}

#[tokio::test]
async fn test_registry_down_uses_fallback_for_known_services() {
    let locator = ServiceLocator::new(shared(ScriptedRegistry::down()));

    let expected = [
        (ServiceName::Auth, "http://auth-service:5000"),
        (ServiceName::Package, "http://package-service:5002"),
        (ServiceName::Booking, "http://booking-service:5003"),
    ];

    for (service, url) in expected {
        let resolution = locator.resolve_detailed(&service).await.unwrap();
        assert_eq!(resolution.url.as_str(), url);
        assert_eq!(resolution.source, ResolutionSource::Fallback);
    }
}

#[tokio::test]
async fn test_every_registry_failure_kind_falls_back() {
    let failures = vec![
        RegistryError::Unreachable {
            message: "timeout".to_string(),
        },
        RegistryError::UnexpectedStatus {
            service: "booking-service".to_string(),
            status: 500,
        },
        RegistryError::MalformedResponse {
            service: "booking-service".to_string(),
            reason: "expected an array".to_string(),
        },
        RegistryError::NoInstances {
            service: "booking-service".to_string(),
        },
    ];

    for failure in failures {
        let registry = ScriptedRegistry::new().with_error("booking-service", failure.clone());
        let locator = ServiceLocator::new(shared(registry));

        let url = locator.resolve(&ServiceName::Booking).await.unwrap();
        assert_eq!(
            url.as_str(),
            "http://booking-service:5003",
            "failure {:?} should fall back",
            failure
        );
    }
}

#[tokio::test]
async fn test_record_without_address_falls_back() {
    let registry = ScriptedRegistry::new().with_instances("auth-service", vec![record("", 5000)]);
    let locator = ServiceLocator::new(shared(registry));

    let resolution = locator.resolve_detailed(&ServiceName::Auth).await.unwrap();
    assert_eq!(resolution.url.as_str(), "http://auth-service:5000");
    assert_eq!(resolution.source, ResolutionSource::Fallback);
}

#[tokio::test]
async fn test_node_address_used_when_service_address_empty() {
    let mut instance = record("", 5002);
    instance.node_address = "10.1.10.12".to_string();
    let registry = ScriptedRegistry::new().with_instances("package-service", vec![instance]);
    let locator = ServiceLocator::new(shared(registry));

    let resolution = locator.resolve_detailed(&ServiceName::Package).await.unwrap();
    assert_eq!(resolution.url.as_str(), "http://10.1.10.12:5002");
    assert_eq!(resolution.source, ResolutionSource::Registry);
}

#[tokio::test]
async fn test_unknown_service_without_fallback_is_unresolvable() {
    let metrics = Arc::new(MetricsCollector::new().unwrap());
    let locator =
        ServiceLocator::new(shared(ScriptedRegistry::down())).with_metrics(metrics.clone());

    let result = locator.resolve(&ServiceName::from("payment-service")).await;

    match result {
        Err(LocatorError::UnresolvableService { service, cause }) => {
            assert_eq!(service, "payment-service");
            assert_eq!(cause.kind(), "unreachable");
        }
        other => panic!("expected unresolvable service, got {:?}", other),
    }

    let unresolvable = metrics
        .locator()
        .unresolvable_total
        .with_label_values(&["payment-service"])
        .get();
    assert_eq!(unresolvable, 1);
}

#[tokio::test]
async fn test_unknown_service_resolves_through_registry() {
    let registry = ScriptedRegistry::new()
        .with_instances("payment-service", vec![record("10.0.0.9", 7000)]);
    let locator = ServiceLocator::new(shared(registry));

    let url = locator
        .resolve(&ServiceName::from("payment-service"))
        .await
        .unwrap();
    assert_eq!(url.as_str(), "http://10.0.0.9:7000");
}

#[tokio::test]
async fn test_configured_fallback_overrides() {
    let config = AppConfig::from_vars(vec![
        (
            "FALLBACK_PAYMENT_SERVICE_URL".to_string(),
            "http://payments.internal:7000".to_string(),
        ),
        (
            "FALLBACK_AUTH_SERVICE_URL".to_string(),
            "http://auth.internal:9000".to_string(),
        ),
    ])
    .unwrap();

    let locator = ServiceLocator::new(shared(ScriptedRegistry::down()))
        .with_fallback(config.fallback_table().unwrap());

    let payment = locator
        .resolve(&ServiceName::from("payment-service"))
        .await
        .unwrap();
    assert_eq!(payment.as_str(), "http://payments.internal:7000");

    let auth = locator.resolve(&ServiceName::Auth).await.unwrap();
    assert_eq!(auth.as_str(), "http://auth.internal:9000");

    let booking = locator.resolve(&ServiceName::Booking).await.unwrap();
    assert_eq!(booking.as_str(), "http://booking-service:5003");
}

#[tokio::test]
async fn test_empty_fallback_table_surfaces_errors_for_known_services() {
    let locator =
        ServiceLocator::new(shared(ScriptedRegistry::down())).with_fallback(FallbackTable::empty());

    assert!(matches!(
        locator.resolve(&ServiceName::Auth).await,
        Err(LocatorError::UnresolvableService { .. })
    ));
}

#[tokio::test]
async fn test_round_robin_spreads_concurrent_callers() {
    let instances = vec![
        record("10.0.0.1", 5003),
        record("10.0.0.2", 5003),
        record("10.0.0.3", 5003),
    ];
    let registry = ScriptedRegistry::new().with_instances("booking-service", instances);
    let locator = Arc::new(
        ServiceLocator::new(shared(registry)).with_policy(SelectionPolicy::RoundRobin),
    );

    let calls = (0..30).map(|_| {
        let locator = locator.clone();
        tokio::spawn(async move { locator.resolve(&ServiceName::Booking).await })
    });

    let mut counts: HashMap<String, usize> = HashMap::new();
    for result in futures::future::join_all(calls).await {
        let url = result.unwrap().unwrap();
        *counts.entry(url.to_string()).or_default() += 1;
    }

    assert_eq!(counts.len(), 3);
    assert!(counts.values().all(|count| *count == 10));
}

#[tokio::test]
async fn test_random_policy_only_returns_registered_instances() {
    let registry = ScriptedRegistry::new().with_instances(
        "auth-service",
        vec![record("10.0.0.1", 5000), record("10.0.0.2", 5000)],
    );
    let locator = ServiceLocator::new(shared(registry)).with_policy(SelectionPolicy::Random);

    for _ in 0..20 {
        let url = locator.resolve(&ServiceName::Auth).await.unwrap();
        assert!(
            url.as_str() == "http://10.0.0.1:5000" || url.as_str() == "http://10.0.0.2:5000"
        );
    }
}

proptest! {
    #[test]
    fn prop_ipv4_records_compose_plain_urls(a in 1u8..=254, b in 0u8..=255, c in 0u8..=255, d in 1u8..=254, port in 1u16..) {
        let address = format!("{}.{}.{}.{}", a, b, c, d);
        let url = ResolvedUrl::from_record(&ServiceRecord::new(address.clone(), port)).unwrap();

        prop_assert_eq!(url.as_str(), format!("http://{}:{}", address, port));
        prop_assert!(!url.as_str().ends_with('/'));
    }

    #[test]
    fn prop_hostnames_round_trip_through_parse(host in "[a-z][a-z0-9-]{0,20}", port in 1u16..) {
        let url = ResolvedUrl::from_record(&ServiceRecord::new(host.clone(), port)).unwrap();
        let parsed = ResolvedUrl::parse(url.as_str()).unwrap();

        prop_assert_eq!(parsed, url);
    }
}
