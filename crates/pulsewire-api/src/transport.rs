// Shared transport configuration for building reqwest::Client instances.
//
// The data API and GraphQL clients share timeout and user-agent settings
// through this module. The bearer token is attached per request so a
// caller-supplied, pooled client can be reused without mutating it.

use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderValue, RETRY_AFTER};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;

use crate::error::{Error, ErrorKind, kind_for_status};

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared transport configuration for building HTTP clients.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("pulsewire/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    /// Build a `reqwest::Client` from this config.
    pub fn build_client(&self) -> Result<reqwest::Client, Error> {
        reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.as_str())
            .build()
            .map_err(Error::Transport)
    }
}

/// `Authorization: Bearer <token>` header value, marked sensitive so it
/// never shows up in `Debug` output.
pub fn bearer_header(token: &SecretString) -> Result<HeaderValue, Error> {
    let mut value = HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
        .map_err(|e| Error::Authentication {
            message: format!("invalid token header value: {e}"),
        })?;
    value.set_sensitive(true);
    Ok(value)
}

/// Attach the bearer token to an outgoing request.
pub(crate) fn authorize(
    request: reqwest::RequestBuilder,
    token: &SecretString,
) -> Result<reqwest::RequestBuilder, Error> {
    Ok(request.header(AUTHORIZATION, bearer_header(token)?))
}

/// Turn a non-success response into a classified [`Error`].
///
/// 401/403 become [`Error::Authentication`], 429 becomes
/// [`Error::RateLimited`] (honouring `Retry-After`), everything else is
/// kept as [`Error::Api`] with the body as message.
pub(crate) async fn error_from_response(resp: reqwest::Response) -> Error {
    let status = resp.status();
    let retry_after_secs = resp
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok());

    match kind_for_status(status.as_u16()) {
        ErrorKind::Auth => Error::Authentication {
            message: format!("token rejected (HTTP {})", status.as_u16()),
        },
        ErrorKind::RateLimited => Error::RateLimited { retry_after_secs },
        ErrorKind::Transient | ErrorKind::Malformed => {
            let raw = resp.text().await.unwrap_or_default();
            Error::Api {
                status: status.as_u16(),
                message: if raw.is_empty() {
                    status.to_string()
                } else {
                    raw
                },
            }
        }
    }
}

/// Check the status and deserialize a JSON body.
///
/// Decoding failures keep the raw body and a short preview in the message.
pub(crate) async fn handle_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, Error> {
    if !resp.status().is_success() {
        return Err(error_from_response(resp).await);
    }
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}

/// Map a reqwest failure, turning timeouts into [`Error::Timeout`].
pub(crate) fn send_error(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_secs: timeout.as_secs(),
        }
    } else {
        Error::Transport(err)
    }
}
