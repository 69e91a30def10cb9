use thiserror::Error;

/// Retry class of an [`Error`].
///
/// Computed once at the API boundary; the ingestion engine branches on
/// this and never looks at HTTP status codes or socket errors itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credential rejected. Terminal: stops reconnect loops.
    Auth,
    /// Provider asked us to slow down. Retried after a delay.
    RateLimited,
    /// Timeout, reset, refused connection, server hiccup. Retried.
    Transient,
    /// Payload did not have the expected shape. Dropped.
    Malformed,
}

/// Top-level error type for the `pulsewire-api` crate.
///
/// Covers every failure mode across the three API surfaces: the REST
/// data API, the GraphQL HTTP endpoint, and the realtime websocket.
/// `pulsewire-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token rejected (HTTP 401/403 or GraphQL `UNAUTHENTICATED`).
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Throttling ──────────────────────────────────────────────────
    /// Rate limited by the provider. `retry_after_secs` comes from the
    /// `Retry-After` header when present.
    #[error("Rate limited{}", retry_suffix(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Non-success HTTP status not covered by a more specific variant.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── GraphQL ─────────────────────────────────────────────────────
    /// The GraphQL endpoint answered with an `errors` array.
    #[error("GraphQL error: {message}")]
    GraphQl { message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed before or during the upgrade.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The upgrade request was answered with a non-101 HTTP status.
    #[error("WebSocket handshake rejected (HTTP {status})")]
    WebSocketHandshake { status: u16 },

    /// The server closed the socket with a non-normal close code.
    /// Codes in the 4xxx range mirror HTTP statuses (4401, 4429, ...).
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// The server sent an `error` or `connection_error` frame that does
    /// not concern the credential.
    #[error("Subscription rejected: {message}")]
    SubscriptionRejected { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Classify this error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Authentication { .. } => ErrorKind::Auth,
            Self::RateLimited { .. } => ErrorKind::RateLimited,
            Self::Transport(e) => {
                if e.is_decode() {
                    ErrorKind::Malformed
                } else {
                    e.status()
                        .map_or(ErrorKind::Transient, |s| kind_for_status(s.as_u16()))
                }
            }
            Self::Api { status, .. } | Self::WebSocketHandshake { status } => {
                kind_for_status(*status)
            }
            Self::WebSocketClosed { code, .. } => match code {
                4000..=4999 => kind_for_status(code - 4000),
                _ => ErrorKind::Transient,
            },
            Self::GraphQl { .. } | Self::Deserialization { .. } | Self::InvalidUrl(_) => {
                ErrorKind::Malformed
            }
            Self::Timeout { .. }
            | Self::WebSocketConnect(_)
            | Self::SubscriptionRejected { .. } => ErrorKind::Transient,
        }
    }

    /// Error for a `connection_error` frame answering `connection_init`.
    ///
    /// The init payload only carries the token, so a rejection that names
    /// it (unauthorized, unauthenticated, invalid token) is an
    /// authentication failure; anything else stays retryable.
    pub fn connection_rejected(message: String) -> Self {
        let lower = message.to_ascii_lowercase();
        let names_token = ["unauthorized", "unauthenticated", "forbidden", "invalid token"]
            .iter()
            .any(|needle| lower.contains(needle))
            || (lower.contains("token") && lower.contains("invalid"));
        if names_token {
            Self::Authentication { message }
        } else {
            Self::SubscriptionRejected { message }
        }
    }

    /// Returns `true` if the credential was rejected and retrying is pointless.
    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Returns `true` if this error is worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient | ErrorKind::RateLimited)
    }
}

fn retry_suffix(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs.map_or_else(String::new, |s| format!(" -- retry after {s}s"))
}

/// Map an HTTP status to its retry class.
pub(crate) fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Auth,
        429 => ErrorKind::RateLimited,
        _ => ErrorKind::Transient,
    }
}
