// GraphQL HTTP client.
//
// POST {query, variables} -> {data, errors?}. A response carrying an
// `errors` array is an error even with HTTP 200.

use std::time::Duration;

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;
use url::Url;

use super::queries;
use super::types::{
    GraphQlError, GraphQlRequest, GraphQlResponse, HomeNode, LiveMeasurementData, RealtimeInfo,
    RealtimeInfoData, ViewerHomesData,
};
use crate::Error;
use crate::transport::{self, TransportConfig};

/// Async client for the GraphQL HTTP endpoint.
#[derive(Clone)]
pub struct GraphQlClient {
    http: reqwest::Client,
    endpoint: Url,
    token: SecretString,
    timeout: Duration,
}

impl GraphQlClient {
    /// Build a client with its own connection pool.
    pub fn new(
        endpoint: &str,
        token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(endpoint, http, token, transport.timeout)
    }

    /// Wrap an existing `reqwest::Client`.
    pub fn with_client(
        endpoint: &str,
        http: reqwest::Client,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            endpoint: Url::parse(endpoint)?,
            token,
            timeout,
        })
    }

    /// Execute a query and return its `data` member.
    ///
    /// `errors` with code `UNAUTHENTICATED` map to [`Error::Authentication`];
    /// any other GraphQL error, or a missing `data`, to [`Error::GraphQl`].
    pub async fn query<T: DeserializeOwned>(
        &self,
        query: &str,
        variables: Value,
    ) -> Result<T, Error> {
        debug!(endpoint = %self.endpoint, "POST graphql");

        let body = GraphQlRequest { query, variables };
        let request = transport::authorize(self.http.post(self.endpoint.clone()), &self.token)?;
        let resp = request
            .json(&body)
            .send()
            .await
            .map_err(|e| transport::send_error(e, self.timeout))?;

        let envelope: GraphQlResponse<T> = transport::handle_response(resp).await?;

        if let Some(errors) = envelope.errors.filter(|e| !e.is_empty()) {
            let message = errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            if errors.iter().any(GraphQlError::is_unauthenticated) {
                return Err(Error::Authentication { message });
            }
            return Err(Error::GraphQl { message });
        }

        envelope.data.ok_or_else(|| Error::GraphQl {
            message: "response carried neither data nor errors".into(),
        })
    }

    // ── Operations ───────────────────────────────────────────────────

    /// `viewer.homes` with realtime capability flags.
    pub async fn list_homes(&self) -> Result<Vec<HomeNode>, Error> {
        let data: ViewerHomesData = self.query(queries::VIEWER_HOMES, json!({})).await?;
        Ok(data.viewer.homes.unwrap_or_default())
    }

    /// Realtime flag and advertised websocket endpoint for one home.
    ///
    /// An unknown home reads as not realtime-capable.
    pub async fn realtime_info(&self, home_id: &str) -> Result<RealtimeInfo, Error> {
        let data: RealtimeInfoData = self
            .query(queries::REALTIME_INFO, json!({ "homeId": home_id }))
            .await?;
        let realtime_enabled = data
            .viewer
            .home
            .and_then(|h| h.features)
            .and_then(|f| f.real_time_consumption_enabled)
            .unwrap_or(false);
        Ok(RealtimeInfo {
            realtime_enabled,
            websocket_url: data
                .viewer
                .websocket_subscription_url
                .filter(|u| !u.is_empty()),
        })
    }

    /// One-shot `liveMeasurement` pull. `None` when the service has
    /// nothing to report (null or empty object).
    pub async fn live_measurement(
        &self,
        home_id: &str,
    ) -> Result<Option<Map<String, Value>>, Error> {
        let data: LiveMeasurementData = self
            .query(queries::LIVE_MEASUREMENT_POLL, json!({ "homeId": home_id }))
            .await?;
        Ok(data.live_measurement.filter(|m| !m.is_empty()))
    }
}
