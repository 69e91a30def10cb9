// Integration tests for `GraphQlClient` using wiremock.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use pulsewire_api::{Error, ErrorKind, GraphQlClient, RealtimeInfo};

async fn setup() -> (MockServer, GraphQlClient) {
    let server = MockServer::start().await;
    let client = GraphQlClient::with_client(
        &format!("{}/v1-beta/gql", server.uri()),
        reqwest::Client::new(),
        SecretString::from("gql-token".to_string()),
        Duration::from_secs(5),
    )
    .unwrap();
    (server, client)
}

#[tokio::test]
async fn test_list_homes() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1-beta/gql"))
        .and(header("authorization", "Bearer gql-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "viewer": { "homes": [
                {
                    "id": "home-1",
                    "appNickname": "Villa",
                    "address": { "address1": "Storgata 1" },
                    "features": { "realTimeConsumptionEnabled": true }
                },
                {
                    "id": "home-2",
                    "appNickname": null,
                    "address": { "address1": "Lillegata 2" },
                    "features": { "realTimeConsumptionEnabled": false }
                }
            ] } }
        })))
        .mount(&server)
        .await;

    let homes = client.list_homes().await.unwrap();
    assert_eq!(homes.len(), 2);
    assert_eq!(homes[0].display_name(), "Villa");
    assert!(homes[0].realtime_capable());
    assert_eq!(homes[1].display_name(), "Lillegata 2");
    assert!(!homes[1].realtime_capable());
}

#[tokio::test]
async fn test_realtime_info_passes_home_id() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1-beta/gql"))
        .and(body_partial_json(json!({ "variables": { "homeId": "home-1" } })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "viewer": {
                "websocketSubscriptionUrl": "wss://ws.example/gql",
                "home": { "id": "home-1", "features": { "realTimeConsumptionEnabled": true } }
            } }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let info = client.realtime_info("home-1").await.unwrap();
    assert_eq!(
        info,
        RealtimeInfo {
            realtime_enabled: true,
            websocket_url: Some("wss://ws.example/gql".into()),
        }
    );
}

#[tokio::test]
async fn test_realtime_info_unknown_home_is_not_realtime() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1-beta/gql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "viewer": { "websocketSubscriptionUrl": null, "home": null } }
        })))
        .mount(&server)
        .await;

    let info = client.realtime_info("missing").await.unwrap();
    assert!(!info.realtime_enabled);
    assert!(info.websocket_url.is_none());
}

#[tokio::test]
async fn test_live_measurement() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1-beta/gql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "liveMeasurement": {
                "timestamp": "2026-01-01T12:00:00+01:00",
                "power": 830,
                "powerPhase1": 300
            } }
        })))
        .mount(&server)
        .await;

    let m = client.live_measurement("home-1").await.unwrap().unwrap();
    assert_eq!(m["power"], 830);
    assert_eq!(m.len(), 3);
}

#[tokio::test]
async fn test_live_measurement_null_is_none() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1-beta/gql"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": { "liveMeasurement": null } })),
        )
        .mount(&server)
        .await;

    assert!(client.live_measurement("home-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unauthenticated_graphql_error_is_auth() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1-beta/gql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": null,
            "errors": [{
                "message": "Context creation failed: invalid token",
                "extensions": { "code": "UNAUTHENTICATED" }
            }]
        })))
        .mount(&server)
        .await;

    let err = client.list_homes().await.unwrap_err();
    assert!(matches!(err, Error::Authentication { .. }), "got {err:?}");
}

#[tokio::test]
async fn test_other_graphql_error_is_malformed() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1-beta/gql"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "errors": [{ "message": "Cannot query field \"bogus\"" }]
        })))
        .mount(&server)
        .await;

    let err = client.list_homes().await.unwrap_err();
    assert!(matches!(err, Error::GraphQl { .. }), "got {err:?}");
    assert_eq!(err.kind(), ErrorKind::Malformed);
}

#[tokio::test]
async fn test_http_401_is_auth() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/v1-beta/gql"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    assert!(client.realtime_info("home-1").await.unwrap_err().is_auth());
}
