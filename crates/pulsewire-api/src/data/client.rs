// Async HTTP client for the Tibber Data API.
//
// Base path: https://data-api.tibber.com/v1/
// Auth: Bearer token, attached per request

use std::time::Duration;

use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use super::types::{DeviceList, DeviceResponse, HomeList, HomeResponse};
use crate::Error;
use crate::transport::{self, TransportConfig};

/// Async client for the Data API (`/homes`, `/homes/{id}/devices`, ...).
#[derive(Clone)]
pub struct DataApiClient {
    http: reqwest::Client,
    base_url: Url,
    token: SecretString,
    timeout: Duration,
}

impl DataApiClient {
    // ── Constructors ─────────────────────────────────────────────────

    /// Build a client with its own connection pool.
    pub fn new(
        base_url: &str,
        token: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Self::with_client(base_url, http, token, transport.timeout)
    }

    /// Wrap an existing `reqwest::Client`. The pool is only borrowed for
    /// requests; its configuration is never changed.
    pub fn with_client(
        base_url: &str,
        http: reqwest::Client,
        token: SecretString,
        timeout: Duration,
    ) -> Result<Self, Error> {
        Ok(Self {
            http,
            base_url: normalize_base_url(base_url)?,
            token,
            timeout,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /homes`
    pub async fn list_homes(&self) -> Result<Vec<HomeResponse>, Error> {
        let list: HomeList = self.get("homes").await?;
        Ok(list.homes.unwrap_or_default())
    }

    /// `GET /homes/{homeId}/devices`
    pub async fn list_devices(&self, home_id: &str) -> Result<Vec<DeviceResponse>, Error> {
        let list: DeviceList = self.get(&format!("homes/{home_id}/devices")).await?;
        Ok(list.devices.unwrap_or_default())
    }

    /// `GET /homes/{homeId}/devices/{deviceId}`
    pub async fn get_device(&self, home_id: &str, device_id: &str) -> Result<DeviceResponse, Error> {
        self.get(&format!("homes/{home_id}/devices/{device_id}"))
            .await
    }

    // ── HTTP ─────────────────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = self.url(path)?;
        debug!("GET {url}");

        let request = transport::authorize(self.http.get(url), &self.token)?;
        let resp = request
            .send()
            .await
            .map_err(|e| transport::send_error(e, self.timeout))?;
        transport::handle_response(resp).await
    }
}

/// Ensure the base ends with `/` so relative joins keep the `/v1` segment.
fn normalize_base_url(raw: &str) -> Result<Url, Error> {
    let mut url = Url::parse(raw)?;
    let path = url.path().trim_end_matches('/').to_owned();
    url.set_path(&format!("{path}/"));
    Ok(url)
}
