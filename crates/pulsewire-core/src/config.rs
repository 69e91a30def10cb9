// ── Runtime ingestion configuration ──
//
// These types describe *what* to ingest and how to pace it. They carry
// the token and tuning knobs but never touch disk. The CLI (or any host)
// builds an `IngestConfig` and hands it to the coordinator.

use std::time::Duration;

use pulsewire_api::{DEFAULT_DATA_API_URL, DEFAULT_GRAPHQL_URL, DEFAULT_SUBSCRIPTION_URL};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Whether to use the realtime subscription.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RealtimeMode {
    /// Ask the service whether the home streams realtime data.
    #[default]
    Auto,
    /// Subscribe without asking.
    Always,
    /// Poll only.
    Never,
}

/// Delay between subscription reconnect attempts.
///
/// `delay = min(initial_delay * 2^attempt, max_delay)`. Equal values give
/// a fixed delay, which is the default (10 s).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(10),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl ReconnectConfig {
    /// Same delay for every attempt.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
        }
    }

    /// Delay before reconnect attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(16));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay.max(self.initial_delay))
    }
}

/// Service endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub data_api: String,
    pub graphql: String,
    /// Websocket override. When `None`, the endpoint advertised by the
    /// service is used, then [`DEFAULT_SUBSCRIPTION_URL`].
    pub websocket: Option<String>,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            data_api: DEFAULT_DATA_API_URL.to_owned(),
            graphql: DEFAULT_GRAPHQL_URL.to_owned(),
            websocket: None,
        }
    }
}

impl Endpoints {
    /// Pick the websocket endpoint: override, then advertised, then default.
    pub fn resolve_websocket(&self, advertised: Option<&str>) -> String {
        self.websocket
            .as_deref()
            .or(advertised)
            .unwrap_or(DEFAULT_SUBSCRIPTION_URL)
            .to_owned()
    }

    /// Endpoints for [`pulsewire_api::TelemetryClient`].
    pub fn to_api(&self) -> pulsewire_api::ApiEndpoints {
        pulsewire_api::ApiEndpoints {
            data_api: self.data_api.clone(),
            graphql: self.graphql.clone(),
            subscription: self.resolve_websocket(None),
        }
    }
}

/// Everything a coordinator needs to ingest one home.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub token: SecretString,
    pub home_id: String,
    /// Data API device to poll. Without one, polling uses the GraphQL
    /// live measurement query.
    pub device_id: Option<String>,
    pub endpoints: Endpoints,
    pub realtime: RealtimeMode,
    pub reconnect: ReconnectConfig,
    /// Per-request HTTP timeout and websocket handshake timeout.
    pub request_timeout: Duration,
    pub first_data_timeout: Duration,
    pub piggyback_attempts: u32,
    pub piggyback_interval: Duration,
    pub device_poll_interval: Duration,
    pub live_poll_interval: Duration,
    /// Shared connection pool. Only borrowed for requests.
    pub http_client: Option<reqwest::Client>,
}

impl IngestConfig {
    pub fn new(token: SecretString, home_id: impl Into<String>) -> Self {
        Self {
            token,
            home_id: home_id.into(),
            device_id: None,
            endpoints: Endpoints::default(),
            realtime: RealtimeMode::Auto,
            reconnect: ReconnectConfig::default(),
            request_timeout: Duration::from_secs(30),
            first_data_timeout: Duration::from_secs(90),
            piggyback_attempts: 120,
            piggyback_interval: Duration::from_secs(1),
            device_poll_interval: Duration::from_secs(10),
            live_poll_interval: Duration::from_secs(60),
            http_client: None,
        }
    }
}
