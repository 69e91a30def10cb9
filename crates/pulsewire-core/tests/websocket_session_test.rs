#![allow(clippy::unwrap_used)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use pretty_assertions::assert_eq;
use pulsewire_api::{ApiEndpoints, Error, TelemetryClient, TransportConfig};
use pulsewire_core::{ReconnectConfig, SnapshotStore, SubscriptionSession, SubscriptionState};
use secrecy::SecretString;
use serde_json::json;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;
use url::Url;

use common::{
    accept, bind, drain_until_closed, expect_subscribe, reject, send_json, send_measurement,
    send_text,
};

const HOME: &str = "home-1";
const WAIT: Duration = Duration::from_secs(5);

fn client() -> TelemetryClient {
    TelemetryClient::new(
        &ApiEndpoints::default(),
        SecretString::from(common::TOKEN.to_owned()),
        &TransportConfig {
            timeout: Duration::from_secs(5),
            ..TransportConfig::default()
        },
    )
    .unwrap()
}

fn session(url: Url) -> SubscriptionSession {
    SubscriptionSession::new(
        client(),
        url,
        HOME,
        ReconnectConfig::fixed(Duration::from_millis(100)),
    )
}

/// Run the session until it gives up; the server must see no second
/// connection afterwards.
async fn assert_fails_without_retry(
    url: Url,
    server: impl std::future::Future<Output = tokio::net::TcpListener> + Send + 'static,
) {
    let server = tokio::spawn(async move {
        let listener = server.await;
        timeout(Duration::from_millis(500), listener.accept())
            .await
            .is_err()
    });

    let store = Arc::new(SnapshotStore::new());
    let cancel = CancellationToken::new();
    let task = spawn_session(session(url), &store, &cancel);

    timeout(WAIT, task).await.unwrap().unwrap();
    assert!(matches!(store.state(), SubscriptionState::Failed { .. }));
    assert!(store.failure().unwrap().is_auth());
    assert!(timeout(WAIT, server).await.unwrap().unwrap(), "no reconnect after auth failure");
}

fn spawn_session(
    session: SubscriptionSession,
    store: &Arc<SnapshotStore>,
    cancel: &CancellationToken,
) -> JoinHandle<()> {
    let (store, cancel) = (Arc::clone(store), cancel.clone());
    tokio::spawn(async move { session.run(&store, &cancel).await })
}

async fn wait_for_power(store: &SnapshotStore, power: i64) {
    let mut rx = store.subscribe();
    timeout(
        WAIT,
        rx.wait_for(|s| s.get("power").is_some_and(|c| c.value == json!(power))),
    )
    .await
    .unwrap()
    .unwrap();
}

#[tokio::test]
async fn data_frames_reach_the_store_and_stop_closes_cleanly() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        expect_subscribe(&mut ws, HOME).await;
        send_json(&mut ws, json!({ "type": "connection_ack" })).await;
        send_json(&mut ws, json!({ "type": "ka" })).await;
        send_text(&mut ws, "not json").await;
        send_measurement(
            &mut ws,
            json!({
                "timestamp": "2026-05-01T12:00:00+02:00",
                "power": 1200,
                "powerPhase1": 400.5
            }),
        )
        .await;
        drain_until_closed(&mut ws).await
    });

    let store = Arc::new(SnapshotStore::new());
    let cancel = CancellationToken::new();
    let task = spawn_session(session(url), &store, &cancel);

    wait_for_power(&store, 1200).await;
    assert_eq!(store.state(), SubscriptionState::Live);
    assert_eq!(store.known_keys(), vec!["power", "powerPhase1", "timestamp"]);

    cancel.cancel();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert_eq!(store.state(), SubscriptionState::Stopped);

    let saw_stop = timeout(WAIT, server).await.unwrap().unwrap();
    assert!(saw_stop, "client should send stop before closing");
}

#[tokio::test]
async fn dropped_connection_reconnects_and_keeps_known_keys() {
    let (listener, url) = bind().await;
    let store = Arc::new(SnapshotStore::new());
    let cancel = CancellationToken::new();

    let server_store = Arc::clone(&store);
    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        expect_subscribe(&mut first, HOME).await;
        send_measurement(&mut first, json!({ "power": 1, "voltagePhase1": 230.1 })).await;

        // Close from the server side once the client has the data.
        let mut rx = server_store.subscribe();
        rx.wait_for(|s| !s.is_empty()).await.unwrap();
        first.close(None).await.unwrap();
        // The client must release the old socket.
        drain_until_closed(&mut first).await;

        let mut second = accept(&listener).await;
        expect_subscribe(&mut second, HOME).await;
        send_measurement(&mut second, json!({ "power": 2 })).await;
        drain_until_closed(&mut second).await
    });

    let mut states = store.subscribe_state();
    let task = spawn_session(session(url), &store, &cancel);

    timeout(
        WAIT,
        states.wait_for(|s| matches!(s, SubscriptionState::Reconnecting { attempt: 1, .. })),
    )
    .await
    .unwrap()
    .unwrap();

    wait_for_power(&store, 2).await;
    assert_eq!(store.state(), SubscriptionState::Live);
    // voltagePhase1 was not in the second payload but stays known.
    assert_eq!(store.known_keys(), vec!["power", "voltagePhase1"]);
    assert!(store.latest().get("voltagePhase1").is_some());

    cancel.cancel();
    timeout(WAIT, task).await.unwrap().unwrap();
    assert!(timeout(WAIT, server).await.unwrap().unwrap());
}

#[tokio::test]
async fn unauthorized_handshake_fails_without_retrying() {
    let (listener, url) = bind().await;
    assert_fails_without_retry(url, async move {
        reject(&listener, StatusCode::UNAUTHORIZED).await;
        listener
    })
    .await;
}

#[tokio::test]
async fn rate_limited_handshake_is_retried() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        reject(&listener, StatusCode::TOO_MANY_REQUESTS).await;
        let mut ws = accept(&listener).await;
        expect_subscribe(&mut ws, HOME).await;
        send_measurement(&mut ws, json!({ "power": 42 })).await;
        drain_until_closed(&mut ws).await
    });

    let store = Arc::new(SnapshotStore::new());
    let cancel = CancellationToken::new();
    let task = spawn_session(session(url), &store, &cancel);

    wait_for_power(&store, 42).await;
    assert!(store.failure().is_none());

    cancel.cancel();
    timeout(WAIT, task).await.unwrap().unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn server_error_frame_triggers_reconnect() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut first = accept(&listener).await;
        expect_subscribe(&mut first, HOME).await;
        send_json(
            &mut first,
            json!({ "type": "error", "payload": { "message": "too many subscriptions" } }),
        )
        .await;
        drain_until_closed(&mut first).await;

        let mut second = accept(&listener).await;
        expect_subscribe(&mut second, HOME).await;
        send_measurement(&mut second, json!({ "power": 5 })).await;
        drain_until_closed(&mut second).await
    });

    let store = Arc::new(SnapshotStore::new());
    let cancel = CancellationToken::new();
    let task = spawn_session(session(url), &store, &cancel);

    wait_for_power(&store, 5).await;

    cancel.cancel();
    timeout(WAIT, task).await.unwrap().unwrap();
    timeout(WAIT, server).await.unwrap().unwrap();
}

#[tokio::test]
async fn rejected_connection_init_fails_without_retrying() {
    let (listener, url) = bind().await;
    assert_fails_without_retry(url, async move {
        let mut ws = accept(&listener).await;
        expect_subscribe(&mut ws, HOME).await;
        send_json(
            &mut ws,
            json!({ "type": "connection_error", "payload": { "message": "Unauthorized: invalid token" } }),
        )
        .await;
        drain_until_closed(&mut ws).await;
        listener
    })
    .await;
}

#[tokio::test]
async fn unauthorized_close_code_fails_without_retrying() {
    let (listener, url) = bind().await;
    assert_fails_without_retry(url, async move {
        let mut ws = accept(&listener).await;
        expect_subscribe(&mut ws, HOME).await;
        ws.close(Some(CloseFrame {
            code: CloseCode::from(4401),
            reason: "Unauthorized".into(),
        }))
        .await
        .unwrap();
        drain_until_closed(&mut ws).await;
        listener
    })
    .await;
}

#[tokio::test]
async fn measurement_stream_skips_noise_and_ends_on_error_frame() {
    let (listener, url) = bind().await;
    let server = tokio::spawn(async move {
        let mut ws = accept(&listener).await;
        expect_subscribe(&mut ws, HOME).await;
        send_json(&mut ws, json!({ "type": "connection_ack" })).await;
        send_measurement(&mut ws, json!({ "power": 10 })).await;
        send_text(&mut ws, "{ broken").await;
        send_json(&mut ws, json!({ "type": "ka" })).await;
        send_measurement(&mut ws, json!({})).await;
        send_measurement(&mut ws, json!({ "power": 20 })).await;
        send_json(
            &mut ws,
            json!({ "type": "error", "payload": { "message": "subscription limit" } }),
        )
        .await;
        drain_until_closed(&mut ws).await
    });

    let conn = client().open_subscription(&url, HOME).await.unwrap();
    let items: Vec<_> = timeout(WAIT, conn.into_measurements().collect())
        .await
        .unwrap();

    assert_eq!(items.len(), 3);
    assert_eq!(items[0].as_ref().unwrap()["power"], 10);
    assert_eq!(items[1].as_ref().unwrap()["power"], 20);
    assert!(matches!(
        &items[2],
        Err(Error::SubscriptionRejected { message }) if message == "subscription limit"
    ));
    timeout(WAIT, server).await.unwrap().unwrap();
}
