//! Local `graphql-ws` server for subscription tests.

#![allow(clippy::unwrap_used, dead_code)]

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode};
use url::Url;

pub type ServerSocket = WebSocketStream<TcpStream>;

pub const TOKEN: &str = "test-token";

pub async fn bind() -> (TcpListener, Url) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("ws://{}/v1-beta/gql/subscriptions", listener.local_addr().unwrap()))
        .unwrap();
    (listener, url)
}

/// Accept one upgrade, checking the bearer header and echoing the
/// `graphql-ws` subprotocol.
pub async fn accept(listener: &TcpListener) -> ServerSocket {
    let (stream, _) = listener.accept().await.unwrap();
    let callback = |req: &Request, mut resp: Response| -> Result<Response, ErrorResponse> {
        assert_eq!(
            req.headers().get("authorization").unwrap(),
            &format!("Bearer {TOKEN}")
        );
        resp.headers_mut()
            .insert("sec-websocket-protocol", HeaderValue::from_static("graphql-ws"));
        Ok(resp)
    };
    tokio_tungstenite::accept_hdr_async(stream, callback)
        .await
        .unwrap()
}

/// Answer one upgrade with a plain HTTP error status.
pub async fn reject(listener: &TcpListener, status: StatusCode) {
    let (stream, _) = listener.accept().await.unwrap();
    let callback = move |_: &Request, _: Response| -> Result<Response, ErrorResponse> {
        let mut err = ErrorResponse::new(Some("rejected".to_owned()));
        *err.status_mut() = status;
        Err(err)
    };
    let result = tokio_tungstenite::accept_hdr_async(stream, callback).await;
    assert!(result.is_err());
}

/// Read the next text frame as JSON.
pub async fn next_json(ws: &mut ServerSocket) -> Value {
    loop {
        match ws.next().await.unwrap().unwrap() {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(_) => panic!("client closed before sending a frame"),
            _ => {}
        }
    }
}

/// Expect `connection_init` then `start` for `home_id`.
pub async fn expect_subscribe(ws: &mut ServerSocket, home_id: &str) {
    let init = next_json(ws).await;
    assert_eq!(init["type"], "connection_init");
    assert_eq!(init["payload"]["token"], TOKEN);

    let start = next_json(ws).await;
    assert_eq!(start["type"], "start");
    assert_eq!(start["id"], "1");
    assert_eq!(start["payload"]["variables"]["homeId"], home_id);
}

pub async fn send_text(ws: &mut ServerSocket, text: &str) {
    ws.send(Message::Text(text.to_owned().into())).await.unwrap();
}

pub async fn send_json(ws: &mut ServerSocket, value: Value) {
    send_text(ws, &value.to_string()).await;
}

pub async fn send_measurement(ws: &mut ServerSocket, measurement: Value) {
    send_json(
        ws,
        json!({
            "id": "1",
            "type": "data",
            "payload": { "data": { "liveMeasurement": measurement } }
        }),
    )
    .await;
}

/// Read until the client goes away; returns whether a stop frame was seen.
pub async fn drain_until_closed(ws: &mut ServerSocket) -> bool {
    let mut saw_stop = false;
    while let Some(Ok(msg)) = ws.next().await {
        match msg {
            Message::Text(text) => {
                let value: Value = serde_json::from_str(text.as_str()).unwrap();
                if value == json!({ "id": "1", "type": "stop" }) {
                    saw_stop = true;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
    saw_stop
}
