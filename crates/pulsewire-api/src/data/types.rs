// Data API response types.
//
// Field names follow the service's camelCase JSON. Everything beyond the
// identifiers is optional; the service omits what a device does not report.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ── Envelopes ────────────────────────────────────────────────────────

/// `GET /homes` body. A missing or `null` list reads as empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HomeList {
    #[serde(default)]
    pub homes: Option<Vec<HomeResponse>>,
}

/// `GET /homes/{homeId}/devices` body. A missing or `null` list reads as empty.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceList {
    #[serde(default)]
    pub devices: Option<Vec<DeviceResponse>>,
}

// ── Homes ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeResponse {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub info: Option<HomeInfo>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HomeInfo {
    #[serde(default)]
    pub name: Option<String>,
}

impl HomeResponse {
    /// `info.name`, else `externalId`, else the id.
    pub fn label(&self) -> &str {
        self.info
            .as_ref()
            .and_then(|i| non_empty(i.name.as_deref()))
            .or_else(|| non_empty(self.external_id.as_deref()))
            .unwrap_or(&self.id)
    }
}

// ── Devices ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceResponse {
    pub id: String,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub info: Option<DeviceInfo>,
    /// Entries that are not objects or carry no `id` are skipped.
    #[serde(default, deserialize_with = "lenient_capabilities")]
    pub capabilities: Vec<CapabilityResponse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl DeviceResponse {
    /// Human label: `info.name`, else `externalId`, else `"Device"`,
    /// followed by ` (brand model)` when either is known.
    pub fn label(&self) -> String {
        let info = self.info.clone().unwrap_or_default();
        let name = non_empty(info.name.as_deref())
            .or_else(|| non_empty(self.external_id.as_deref()))
            .unwrap_or("Device");

        let suffix = [info.brand.as_deref(), info.model.as_deref()]
            .into_iter()
            .filter_map(non_empty)
            .collect::<Vec<_>>()
            .join(" ");

        if suffix.is_empty() {
            name.to_owned()
        } else {
            format!("{name} ({suffix})")
        }
    }

    /// Whether the label suggests a Pulse meter reader.
    pub fn looks_like_pulse(&self) -> bool {
        self.label().to_lowercase().contains("pulse")
    }
}

/// One measurement entry of a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityResponse {
    pub id: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CapabilityResponse {
    /// Build from a raw JSON entry. Returns `None` for non-objects and
    /// entries without a usable `id` (string or number).
    pub fn from_value(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;
        let id = match obj.get("id")? {
            Value::String(s) if !s.is_empty() => s.clone(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        Some(Self {
            id,
            value: obj.get("value").cloned().unwrap_or(Value::Null),
            unit: obj.get("unit").and_then(Value::as_str).map(str::to_owned),
            description: obj
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }
}

fn lenient_capabilities<'de, D>(deserializer: D) -> Result<Vec<CapabilityResponse>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(raw.iter().filter_map(CapabilityResponse::from_value).collect())
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.filter(|v| !v.trim().is_empty())
}
