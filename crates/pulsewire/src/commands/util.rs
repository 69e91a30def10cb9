//! Rows and formatting shared by the measurement commands.

use serde_json::Value;
use tabled::Tabled;

use pulsewire_core::{Capability, CanonicalMeasurement, IngestionCoordinator};

use crate::error::CliError;

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct MeasurementRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Category")]
    pub category: String,
}

impl From<&CanonicalMeasurement> for MeasurementRow {
    fn from(m: &CanonicalMeasurement) -> Self {
        Self {
            key: m.key.clone(),
            name: m.name.clone(),
            value: format_measurement(m),
            category: m.category.to_string(),
        }
    }
}

#[derive(Tabled)]
pub struct CapabilityRow {
    #[tabled(rename = "Field")]
    pub field: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Unit")]
    pub unit: String,
}

impl From<&Capability> for CapabilityRow {
    fn from(c: &Capability) -> Self {
        Self {
            field: c.raw_id.clone(),
            value: format_value(&c.value),
            unit: c.unit.clone().unwrap_or_default(),
        }
    }
}

// ── Formatting ──────────────────────────────────────────────────────

/// Value with unit, e.g. `1234.5 W`.
pub fn format_measurement(m: &CanonicalMeasurement) -> String {
    let value = match (m.numeric_value, &m.raw_value) {
        (Some(n), _) => format_number(n),
        (None, Some(raw)) => format_value(raw),
        (None, None) => String::new(),
    };
    match m.unit.as_deref() {
        Some(unit) if !value.is_empty() => format!("{value} {unit}"),
        _ => value,
    }
}

/// Up to three decimals, trailing zeros trimmed.
pub fn format_number(n: f64) -> String {
    let fixed = format!("{n:.3}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        "0".into()
    } else {
        trimmed.to_owned()
    }
}

/// JSON value without quotes around strings.
pub fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), format_number),
        other => other.to_string(),
    }
}

/// `key=value` for plain output.
pub fn plain_measurement(m: &CanonicalMeasurement) -> String {
    format!("{}={}", m.key, format_measurement(m).replace(' ', ""))
}

/// Stop the coordinator, then hand back `err`.
pub async fn stop_with(coordinator: &IngestionCoordinator, err: impl Into<CliError>) -> CliError {
    coordinator.stop().await;
    err.into()
}
