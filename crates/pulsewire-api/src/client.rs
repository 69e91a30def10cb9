// Facade over the three Tibber API surfaces.
//
// Holds no per-call state: every operation is a plain request against one
// of the underlying clients, which share a single reqwest pool.

use std::time::Duration;

use secrecy::SecretString;
use serde_json::{Map, Value};
use url::Url;

use crate::data::DataApiClient;
use crate::data::types::{DeviceResponse, HomeResponse};
use crate::graphql::{GraphQlClient, HomeNode, RealtimeInfo};
use crate::subscription::SubscriptionConnection;
use crate::transport::TransportConfig;
use crate::{DEFAULT_DATA_API_URL, DEFAULT_GRAPHQL_URL, DEFAULT_SUBSCRIPTION_URL, Error};

/// Base URLs for the three API surfaces.
#[derive(Debug, Clone)]
pub struct ApiEndpoints {
    pub data_api: String,
    pub graphql: String,
    /// Websocket endpoint used when the service does not advertise one.
    pub subscription: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            data_api: DEFAULT_DATA_API_URL.to_owned(),
            graphql: DEFAULT_GRAPHQL_URL.to_owned(),
            subscription: DEFAULT_SUBSCRIPTION_URL.to_owned(),
        }
    }
}

/// Stateless request functions over the data API, GraphQL, and the
/// realtime subscription endpoint.
#[derive(Clone)]
pub struct TelemetryClient {
    data: DataApiClient,
    graphql: GraphQlClient,
    token: SecretString,
    timeout: Duration,
}

impl TelemetryClient {
    /// Build a client with a fresh connection pool.
    pub fn new(
        endpoints: &ApiEndpoints,
        token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(endpoints, http, token, transport.timeout)
    }

    /// Build on a shared `reqwest::Client`.
    pub fn with_client(
        endpoints: &ApiEndpoints,
        http: reqwest::Client,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, Error> {
        let data =
            DataApiClient::with_client(&endpoints.data_api, http.clone(), token.clone(), timeout)?;
        let graphql = GraphQlClient::with_client(&endpoints.graphql, http, token.clone(), timeout)?;
        Ok(Self {
            data,
            graphql,
            token,
            timeout,
        })
    }

    /// Check the token by listing homes. Returns how many homes it sees.
    pub async fn authenticate(&self) -> Result<usize, Error> {
        Ok(self.graphql.list_homes().await?.len())
    }

    /// Homes with display name and realtime capability.
    pub async fn list_homes(&self) -> Result<Vec<HomeNode>, Error> {
        self.graphql.list_homes().await
    }

    /// Homes as known to the data API (device-level access).
    pub async fn list_data_homes(&self) -> Result<Vec<HomeResponse>, Error> {
        self.data.list_homes().await
    }

    pub async fn list_devices(&self, home_id: &str) -> Result<Vec<DeviceResponse>, Error> {
        self.data.list_devices(home_id).await
    }

    /// One device with its current capability values.
    pub async fn get_device_snapshot(
        &self,
        home_id: &str,
        device_id: &str,
    ) -> Result<DeviceResponse, Error> {
        self.data.get_device(home_id, device_id).await
    }

    pub async fn realtime_info(&self, home_id: &str) -> Result<RealtimeInfo, Error> {
        self.graphql.realtime_info(home_id).await
    }

    pub async fn live_measurement(
        &self,
        home_id: &str,
    ) -> Result<Option<Map<String, Value>>, Error> {
        self.graphql.live_measurement(home_id).await
    }

    /// Connect to `ws_url` and start the live measurement subscription
    /// (`connection_init` with the token, then `start` for `home_id`).
    pub async fn open_subscription(
        &self,
        ws_url: &Url,
        home_id: &str,
    ) -> Result<SubscriptionConnection, Error> {
        let mut conn = SubscriptionConnection::connect(ws_url, &self.token, self.timeout).await?;
        conn.subscribe(&self.token, home_id).await?;
        Ok(conn)
    }
}
