// ── API-to-domain type conversions ──
//
// Bridges raw `pulsewire_api` response types into the provider-neutral
// model. Vendor field names are preserved verbatim as raw ids.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use pulsewire_api::{CapabilityResponse, DeviceResponse, HomeNode};

use crate::model::{Capability, Device, Home, Snapshot};

impl From<HomeNode> for Home {
    fn from(node: HomeNode) -> Self {
        Home {
            display_name: node.display_name().to_owned(),
            realtime_capable: node.realtime_capable(),
            id: node.id,
        }
    }
}

impl From<&CapabilityResponse> for Capability {
    fn from(c: &CapabilityResponse) -> Self {
        Capability {
            raw_id: c.id.clone(),
            value: c.value.clone(),
            unit: c.unit.clone(),
            description: c.description.clone(),
        }
    }
}

impl Device {
    pub fn from_response(home_id: &str, device: &DeviceResponse) -> Self {
        Device {
            id: device.id.clone(),
            home_id: home_id.to_owned(),
            label: device.label(),
            capabilities: device.capabilities.iter().map(Capability::from).collect(),
        }
    }
}

impl Snapshot {
    /// Snapshot of a device's capabilities, stamped with `received_at`.
    pub fn from_device(device: &DeviceResponse, received_at: DateTime<Utc>) -> Self {
        Snapshot::new(
            received_at,
            device.capabilities.iter().map(Capability::from),
        )
    }

    /// Snapshot of a `liveMeasurement` payload. Every field becomes a
    /// capability; the payload's own `timestamp` wins over `received_at`
    /// when it parses as RFC 3339.
    pub fn from_live_measurement(payload: &Map<String, Value>, received_at: DateTime<Utc>) -> Self {
        let timestamp = payload
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map_or(received_at, |t| t.with_timezone(&Utc));

        Snapshot::new(
            timestamp,
            payload
                .iter()
                .map(|(field, value)| Capability::new(field.clone(), value.clone())),
        )
    }
}
