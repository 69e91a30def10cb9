use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ── Envelope ─────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct GraphQlRequest<'a> {
    pub query: &'a str,
    pub variables: Value,
}

/// `{data, errors?}` as returned with HTTP 200.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlError {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub extensions: Option<GraphQlErrorExtensions>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphQlErrorExtensions {
    #[serde(default)]
    pub code: Option<String>,
}

impl GraphQlError {
    pub fn is_unauthenticated(&self) -> bool {
        self.extensions
            .as_ref()
            .and_then(|e| e.code.as_deref())
            .is_some_and(|c| c == "UNAUTHENTICATED")
    }
}

// ── Homes ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct ViewerHomesData {
    pub viewer: ViewerHomes,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ViewerHomes {
    #[serde(default)]
    pub homes: Option<Vec<HomeNode>>,
}

/// A home as listed by `viewer.homes`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeNode {
    pub id: String,
    #[serde(default)]
    pub app_nickname: Option<String>,
    #[serde(default)]
    pub address: Option<HomeAddress>,
    #[serde(default)]
    pub features: Option<HomeFeatures>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeAddress {
    #[serde(default)]
    pub address1: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeFeatures {
    #[serde(default)]
    pub real_time_consumption_enabled: Option<bool>,
}

impl HomeNode {
    /// `appNickname`, else `address.address1`, else the id.
    pub fn display_name(&self) -> &str {
        let nickname = self.app_nickname.as_deref().filter(|s| !s.is_empty());
        let street = self
            .address
            .as_ref()
            .and_then(|a| a.address1.as_deref())
            .filter(|s| !s.is_empty());
        nickname.or(street).unwrap_or(&self.id)
    }

    pub fn realtime_capable(&self) -> bool {
        self.features
            .as_ref()
            .and_then(|f| f.real_time_consumption_enabled)
            .unwrap_or(false)
    }
}

// ── Realtime info ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct RealtimeInfoData {
    pub viewer: RealtimeViewer,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RealtimeViewer {
    #[serde(default)]
    pub websocket_subscription_url: Option<String>,
    #[serde(default)]
    pub home: Option<RealtimeHome>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RealtimeHome {
    #[serde(default)]
    pub features: Option<HomeFeatures>,
}

/// Whether a home streams realtime data, and where to subscribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RealtimeInfo {
    pub realtime_enabled: bool,
    /// `None` when the service did not advertise an endpoint.
    pub websocket_url: Option<String>,
}

// ── Live measurement ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveMeasurementData {
    #[serde(default)]
    pub live_measurement: Option<Map<String, Value>>,
}
