use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};

/// Physical quantity of a canonical measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    Power,
    Energy,
    Voltage,
    Current,
    Frequency,
    Temperature,
    Dimensionless,
}

/// How successive values relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Aggregation {
    /// A point-in-time reading.
    Instantaneous,
    /// A counter that only grows, apart from meter resets.
    TotalIncreasing,
}

/// A measurement mapped onto a canonical sensor key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalMeasurement {
    pub key: String,
    pub name: String,
    /// Set when the value is a number or numeric-looking text.
    pub numeric_value: Option<f64>,
    /// The delivered value, kept when it could not be read as a number.
    pub raw_value: Option<Value>,
    pub unit: Option<String>,
    pub category: Category,
    /// `None` for quantities without a meaningful state class (power factor).
    pub aggregation: Option<Aggregation>,
}
