//! GraphQL-over-websocket (`graphql-ws` subprotocol) for live measurements.
//!
//! A [`SubscriptionConnection`] is one upgraded socket: open it with
//! [`SubscriptionConnection::connect`], send `connection_init` + `start`
//! with [`subscribe`](SubscriptionConnection::subscribe), then pull typed
//! [`ServerMessage`]s until the stream ends. Reconnecting is the caller's
//! job; this module never retries.
//!
//! ```rust,ignore
//! let mut conn = SubscriptionConnection::connect(&url, &token, Duration::from_secs(30)).await?;
//! conn.subscribe(&token, "home-id").await?;
//! while let Some(msg) = conn.next_message().await {
//!     if let ServerMessage::Data { measurement, .. } = msg? {
//!         println!("{measurement:?}");
//!     }
//! }
//! conn.close().await?;
//! ```

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;
use crate::graphql::queries::LIVE_MEASUREMENT_SUBSCRIPTION;

/// Subprotocol negotiated on the upgrade request.
pub const SUBPROTOCOL: &str = "graphql-ws";

/// Operation id of our single subscription.
pub const SUBSCRIPTION_ID: &str = "1";

// ── Outbound frames ──────────────────────────────────────────────────

/// Frames we send.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    ConnectionInit { payload: Value },
    Start { id: String, payload: Value },
    Stop { id: String },
}

impl ClientMessage {
    pub fn connection_init(token: &SecretString) -> Self {
        Self::ConnectionInit {
            payload: json!({ "token": token.expose_secret() }),
        }
    }

    pub fn start(home_id: &str) -> Self {
        Self::Start {
            id: SUBSCRIPTION_ID.to_owned(),
            payload: json!({
                "query": LIVE_MEASUREMENT_SUBSCRIPTION,
                "variables": { "homeId": home_id },
            }),
        }
    }

    pub fn stop() -> Self {
        Self::Stop {
            id: SUBSCRIPTION_ID.to_owned(),
        }
    }

    fn to_text(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Deserialization {
            message: format!("could not encode outbound frame: {e}"),
            body: String::new(),
        })
    }
}

// ── Inbound frames ───────────────────────────────────────────────────

/// Frames we receive, parsed once at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    ConnectionAck,
    KeepAlive,
    /// `payload.data.liveMeasurement`; empty when the payload had none.
    Data {
        id: Option<String>,
        measurement: Map<String, Value>,
    },
    /// `error`, or a `data` frame carrying `errors`.
    Error { message: String },
    /// `connection_error`: the server refused `connection_init`.
    ConnectionError { message: String },
    Complete { id: Option<String> },
    Unknown { kind: String },
}

impl ServerMessage {
    /// Parse a text frame. Non-JSON and untyped frames are
    /// [`Error::Deserialization`].
    pub fn parse(text: &str) -> Result<Self, Error> {
        let malformed = |message: String| Error::Deserialization {
            message,
            body: text.chars().take(200).collect(),
        };

        let value: Value =
            serde_json::from_str(text).map_err(|e| malformed(format!("frame is not JSON: {e}")))?;
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("frame has no `type`".into()))?;
        let id = value.get("id").and_then(Value::as_str).map(str::to_owned);

        Ok(match kind {
            "connection_ack" => Self::ConnectionAck,
            "ka" | "keep_alive" => Self::KeepAlive,
            "data" | "next" => {
                let payload = value.get("payload");
                if let Some(errors) = payload
                    .and_then(|p| p.get("errors"))
                    .and_then(Value::as_array)
                    .filter(|e| !e.is_empty())
                {
                    Self::Error {
                        message: error_messages(errors),
                    }
                } else {
                    let measurement = payload
                        .and_then(|p| p.get("data"))
                        .and_then(|d| d.get("liveMeasurement"))
                        .and_then(Value::as_object)
                        .cloned()
                        .unwrap_or_default();
                    Self::Data { id, measurement }
                }
            }
            "error" => Self::Error {
                message: payload_message(&value, "server error"),
            },
            "connection_error" => Self::ConnectionError {
                message: payload_message(&value, "connection refused"),
            },
            "complete" => Self::Complete { id },
            other => Self::Unknown {
                kind: other.to_owned(),
            },
        })
    }

    /// The error carried by an `error` or `connection_error` frame.
    pub fn into_error(self) -> Option<Error> {
        match self {
            Self::Error { message } => Some(Error::SubscriptionRejected { message }),
            Self::ConnectionError { message } => Some(Error::connection_rejected(message)),
            _ => None,
        }
    }
}

fn payload_message(frame: &Value, fallback: &str) -> String {
    frame
        .get("payload")
        .map_or_else(|| fallback.to_owned(), describe_payload)
}

fn error_messages(errors: &[Value]) -> String {
    errors
        .iter()
        .map(describe_payload)
        .collect::<Vec<_>>()
        .join("; ")
}

fn describe_payload(payload: &Value) -> String {
    match payload {
        Value::String(s) => s.clone(),
        Value::Array(items) => error_messages(items),
        other => other
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| other.to_string(), str::to_owned),
    }
}

// ── Connection ───────────────────────────────────────────────────────

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One upgraded websocket carrying the live measurement subscription.
pub struct SubscriptionConnection {
    socket: Socket,
}

impl SubscriptionConnection {
    /// Perform the websocket upgrade with the bearer header and the
    /// `graphql-ws` subprotocol.
    ///
    /// A non-101 answer becomes [`Error::WebSocketHandshake`] so 401/403
    /// and 429 classify like their HTTP counterparts.
    pub async fn connect(
        url: &Url,
        token: &SecretString,
        timeout: Duration,
    ) -> Result<Self, Error> {
        tracing::info!(url = %url, "Connecting to subscription endpoint");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| {
                Error::WebSocketConnect(e.to_string())
            })?;

        let request = ClientRequestBuilder::new(uri)
            .with_header("Authorization", format!("Bearer {}", token.expose_secret()))
            .with_sub_protocol(SUBPROTOCOL);

        let (socket, _response) =
            match tokio::time::timeout(timeout, tokio_tungstenite::connect_async(request)).await {
                Err(_) => {
                    return Err(Error::Timeout {
                        timeout_secs: timeout.as_secs(),
                    });
                }
                Ok(Err(tungstenite::Error::Http(resp))) => {
                    return Err(Error::WebSocketHandshake {
                        status: resp.status().as_u16(),
                    });
                }
                Ok(Err(e)) => return Err(Error::WebSocketConnect(e.to_string())),
                Ok(Ok(pair)) => pair,
            };

        tracing::info!("Subscription socket connected");
        Ok(Self { socket })
    }

    /// Send `connection_init` (token payload) followed by `start`.
    pub async fn subscribe(&mut self, token: &SecretString, home_id: &str) -> Result<(), Error> {
        self.send(&ClientMessage::connection_init(token)).await?;
        self.send(&ClientMessage::start(home_id)).await
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), Error> {
        let text = message.to_text()?;
        self.socket
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))
    }

    /// Next inbound frame.
    ///
    /// `None` when the stream ended or the server closed the socket
    /// normally; any other close code yields [`Error::WebSocketClosed`].
    /// Control and binary frames are skipped. A text frame that fails to
    /// parse yields `Some(Err(Error::Deserialization { .. }))` and the
    /// connection stays usable.
    pub async fn next_message(&mut self) -> Option<Result<ServerMessage, Error>> {
        loop {
            match self.socket.next().await? {
                Ok(Message::Text(text)) => return Some(ServerMessage::parse(text.as_str())),
                Ok(Message::Close(frame)) => {
                    let Some(cf) = frame else {
                        tracing::info!("Subscription close frame received (no payload)");
                        return None;
                    };
                    let code = u16::from(cf.code);
                    tracing::info!(code, reason = %cf.reason, "Subscription close frame received");
                    if matches!(cf.code, CloseCode::Normal | CloseCode::Away) {
                        return None;
                    }
                    return Some(Err(Error::WebSocketClosed {
                        code,
                        reason: cf.reason.as_str().to_owned(),
                    }));
                }
                Ok(Message::Ping(_)) => {
                    // tungstenite queues the pong itself
                    tracing::trace!("Subscription ping");
                }
                Ok(_) => {}
                Err(e) => return Some(Err(Error::WebSocketConnect(e.to_string()))),
            }
        }
    }

    /// Send `stop` for our subscription, then a close frame.
    pub async fn close(mut self) -> Result<(), Error> {
        let stop = self.send(&ClientMessage::stop()).await;
        let close = self
            .socket
            .close(None)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()));
        stop.and(close)
    }

    /// Turn the connection into a stream of non-empty measurement
    /// payloads. Server `error` and `connection_error` frames end the
    /// stream with an error; keep-alives, acks and unparseable frames are
    /// skipped.
    pub fn into_measurements(mut self) -> impl Stream<Item = Result<Map<String, Value>, Error>> {
        async_stream::stream! {
            while let Some(next) = self.next_message().await {
                match next {
                    Ok(ServerMessage::Data { measurement, .. }) if !measurement.is_empty() => {
                        yield Ok(measurement);
                    }
                    Ok(ServerMessage::Complete { .. }) => break,
                    Ok(message) => {
                        if let Some(err) = message.into_error() {
                            yield Err(err);
                            break;
                        }
                    }
                    Err(Error::Deserialization { message, .. }) => {
                        tracing::debug!(error = %message, "Skipping malformed frame");
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn outbound_frames_match_protocol() {
        let token = SecretString::from("tok".to_string());
        let init = serde_json::to_value(ClientMessage::connection_init(&token)).unwrap();
        assert_eq!(init, json!({ "type": "connection_init", "payload": { "token": "tok" } }));

        let start = serde_json::to_value(ClientMessage::start("home-1")).unwrap();
        assert_eq!(start["type"], "start");
        assert_eq!(start["id"], "1");
        assert_eq!(start["payload"]["variables"], json!({ "homeId": "home-1" }));
        assert!(
            start["payload"]["query"]
                .as_str()
                .unwrap()
                .contains("powerPhase1")
        );

        let stop = serde_json::to_value(ClientMessage::stop()).unwrap();
        assert_eq!(stop, json!({ "id": "1", "type": "stop" }));
    }

    #[test]
    fn data_frame_extracts_live_measurement() {
        let raw = json!({
            "id": "1",
            "type": "data",
            "payload": { "data": { "liveMeasurement": { "power": 1200, "powerPhase1": 400 } } }
        });
        let msg = ServerMessage::parse(&raw.to_string()).unwrap();
        let ServerMessage::Data { id, measurement } = msg else {
            panic!("expected data frame");
        };
        assert_eq!(id.as_deref(), Some("1"));
        assert_eq!(measurement["power"], 1200);
        assert_eq!(measurement.len(), 2);
    }

    #[test]
    fn data_frame_without_measurement_is_empty() {
        let raw = json!({ "id": "1", "type": "data", "payload": { "data": {} } });
        assert_eq!(
            ServerMessage::parse(&raw.to_string()).unwrap(),
            ServerMessage::Data {
                id: Some("1".into()),
                measurement: Map::new()
            }
        );
    }

    #[test]
    fn data_frame_with_errors_is_an_error() {
        let raw = json!({
            "id": "1",
            "type": "data",
            "payload": { "errors": [{ "message": "home not found" }] }
        });
        assert_eq!(
            ServerMessage::parse(&raw.to_string()).unwrap(),
            ServerMessage::Error {
                message: "home not found".into()
            }
        );
    }

    #[test]
    fn control_frames() {
        assert_eq!(
            ServerMessage::parse(r#"{"type":"connection_ack"}"#).unwrap(),
            ServerMessage::ConnectionAck
        );
        assert_eq!(
            ServerMessage::parse(r#"{"type":"ka"}"#).unwrap(),
            ServerMessage::KeepAlive
        );
        assert_eq!(
            ServerMessage::parse(r#"{"type":"connection_error","payload":{"message":"bad token"}}"#)
                .unwrap(),
            ServerMessage::ConnectionError {
                message: "bad token".into()
            }
        );
        assert_eq!(
            ServerMessage::parse(r#"{"type":"surprise"}"#).unwrap(),
            ServerMessage::Unknown {
                kind: "surprise".into()
            }
        );
    }

    #[test]
    fn error_frames_convert_to_classified_errors() {
        let rejected = ServerMessage::parse(
            r#"{"type":"connection_error","payload":{"message":"Unauthorized: invalid token"}}"#,
        )
        .unwrap()
        .into_error()
        .unwrap();
        assert!(rejected.is_auth());

        let refused = ServerMessage::parse(r#"{"type":"error","payload":{"message":"busy"}}"#)
            .unwrap()
            .into_error()
            .unwrap();
        assert!(matches!(refused, Error::SubscriptionRejected { .. }));
        assert!(refused.is_transient());

        assert!(ServerMessage::KeepAlive.into_error().is_none());
    }

    #[test]
    fn malformed_frames_are_rejected() {
        assert!(matches!(
            ServerMessage::parse("not json"),
            Err(Error::Deserialization { .. })
        ));
        assert!(matches!(
            ServerMessage::parse(r#"{"payload":{}}"#),
            Err(Error::Deserialization { .. })
        ));
    }
}
