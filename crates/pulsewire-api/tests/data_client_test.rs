// Integration tests for `DataApiClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pulsewire_api::{DataApiClient, Error, ErrorKind};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, DataApiClient) {
    let server = MockServer::start().await;
    let client = DataApiClient::with_client(
        &format!("{}/v1", server.uri()),
        reqwest::Client::new(),
        SecretString::from("test-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    (server, client)
}

// ── Happy paths ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_homes_sends_bearer_token() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "homes": [
                { "id": "home-1", "info": { "name": "Cabin" } },
                { "id": "home-2", "externalId": "ext-2" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let homes = client.list_homes().await.unwrap();
    let labels: Vec<_> = homes.iter().map(|h| h.label()).collect();
    assert_eq!(labels, vec!["Cabin", "ext-2"]);
}

#[tokio::test]
async fn test_list_homes_null_list_is_empty() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "homes": null })))
        .mount(&server)
        .await;

    assert!(client.list_homes().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_devices() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes/home-1/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                { "id": "dev-1", "info": { "name": "Pulse", "brand": "Tibber", "model": "P1" } },
                { "id": "dev-2", "info": { "name": "Charger" } }
            ]
        })))
        .mount(&server)
        .await;

    let devices = client.list_devices("home-1").await.unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0].label(), "Pulse (Tibber P1)");
    assert!(devices[0].looks_like_pulse());
    assert!(!devices[1].looks_like_pulse());
}

#[tokio::test]
async fn test_get_device_with_capabilities() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes/home-1/devices/dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "dev-1",
            "capabilities": [
                { "id": "power", "value": 1520.5, "unit": "W" },
                { "id": "energyImportTotal", "value": "123456", "unit": "Wh", "description": "Import" },
                42
            ]
        })))
        .mount(&server)
        .await;

    let device = client.get_device("home-1", "dev-1").await.unwrap();
    assert_eq!(device.capabilities.len(), 2);
    assert_eq!(device.capabilities[1].id, "energyImportTotal");
    assert_eq!(device.capabilities[1].unit.as_deref(), Some("Wh"));
    assert_eq!(device.capabilities[1].description.as_deref(), Some("Import"));
}

// ── Error paths ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_unauthorized_is_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let err = client.list_homes().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_forbidden_is_auth_error() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes/home-1/devices"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    assert!(client.list_devices("home-1").await.unwrap_err().is_auth());
}

#[tokio::test]
async fn test_rate_limited_reads_retry_after() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "17"))
        .mount(&server)
        .await;

    let err = client.list_homes().await.unwrap_err();
    assert!(
        matches!(
            err,
            Error::RateLimited {
                retry_after_secs: Some(17)
            }
        ),
        "got {err:?}"
    );
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = client.list_homes().await.unwrap_err();
    match &err {
        Error::Api { status, message } => {
            assert_eq!(*status, 503);
            assert_eq!(message, "maintenance");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn test_unexpected_body_is_malformed() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/v1/homes/home-1/devices/dev-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let err = client.get_device("home-1", "dev-1").await.unwrap_err();
    match &err {
        Error::Deserialization { body, .. } => assert_eq!(body, "<html>oops</html>"),
        other => panic!("expected Deserialization, got {other:?}"),
    }
    assert_eq!(err.kind(), ErrorKind::Malformed);
}
