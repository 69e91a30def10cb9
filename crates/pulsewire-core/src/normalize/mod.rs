// ── Capability normalization ──
//
// Maps vendor-defined field names (`powerPhase1`, `energy.import-total`,
// `currentL2`, ...) onto a small set of canonical sensor keys with units
// and semantics. Pure and deterministic: no I/O, no clocks, no state.

mod table;

use std::collections::HashSet;

use serde_json::Value;

use crate::model::{Aggregation, CanonicalMeasurement, Category, Snapshot};

pub use table::{CapabilityTable, MeasurementSpec};

/// Snake-case a raw identifier.
///
/// Inserts `_` between a lowercase letter or digit and a following ASCII
/// uppercase letter, turns `.` and `-` into `_`, collapses runs of `_`,
/// then lowercases. `"PowerPhase1"` becomes `"power_phase1"`.
pub fn canonical_token(raw: &str) -> String {
    let mut snake = String::with_capacity(raw.len() + 4);
    let mut prev: Option<char> = None;

    for c in raw.chars() {
        if c.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            snake.push('_');
        }
        let c = if matches!(c, '.' | '-') { '_' } else { c };
        if !(c == '_' && snake.ends_with('_')) {
            snake.push(c);
        }
        prev = Some(c);
    }

    snake.to_lowercase()
}

/// Read a JSON number, boolean (0/1), or numeric-looking text as `f64`.
pub fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

impl CapabilityTable {
    /// Normalize one raw field.
    ///
    /// Known aliases map to their spec. Unknown fields with a numeric value
    /// pass through under their canonical token as a dimensionless reading
    /// with the delivered unit. Unknown non-numeric fields yield `None`.
    pub fn normalize(
        &self,
        raw_id: &str,
        raw_value: &Value,
        raw_unit: Option<&str>,
    ) -> Option<CanonicalMeasurement> {
        let token = canonical_token(raw_id);
        let number = coerce_number(raw_value);

        if let Some(spec) = self.lookup(&token) {
            let scale_wh = spec.unit.as_deref() == Some(table::KILOWATT_HOURS)
                && raw_unit.is_some_and(|u| u.eq_ignore_ascii_case("wh"));
            return Some(CanonicalMeasurement {
                key: spec.key.clone(),
                name: spec.name.clone(),
                numeric_value: number.map(|v| if scale_wh { v / 1000.0 } else { v }),
                raw_value: number.is_none().then(|| raw_value.clone()),
                unit: spec.unit.clone().or_else(|| raw_unit.map(str::to_owned)),
                category: spec.category,
                aggregation: spec.aggregation,
            });
        }

        number.map(|value| CanonicalMeasurement {
            name: raw_id.to_owned(),
            key: token,
            numeric_value: Some(value),
            raw_value: None,
            unit: raw_unit.map(str::to_owned),
            category: Category::Dimensionless,
            aggregation: Some(Aggregation::Instantaneous),
        })
    }

    /// Normalize every capability of a snapshot, in raw-id order.
    /// When two raw ids map to the same key, the first one wins.
    pub fn project(&self, snapshot: &Snapshot) -> Vec<CanonicalMeasurement> {
        let mut seen = HashSet::new();
        snapshot
            .capabilities
            .values()
            .filter_map(|c| self.normalize(&c.raw_id, &c.value, c.unit.as_deref()))
            .filter(|m| seen.insert(m.key.clone()))
            .collect()
    }
}

/// [`CapabilityTable::normalize`] against the built-in table.
pub fn normalize(
    raw_id: &str,
    raw_value: &Value,
    raw_unit: Option<&str>,
) -> Option<CanonicalMeasurement> {
    CapabilityTable::builtin().normalize(raw_id, raw_value, raw_unit)
}

/// [`CapabilityTable::project`] against the built-in table.
pub fn project(snapshot: &Snapshot) -> Vec<CanonicalMeasurement> {
    CapabilityTable::builtin().project(snapshot)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::Capability;

    #[test]
    fn canonical_token_examples() {
        assert_eq!(canonical_token("PowerPhase1"), "power_phase1");
        assert_eq!(canonical_token("powerPhase1"), "power_phase1");
        assert_eq!(canonical_token("currentL2"), "current_l2");
        assert_eq!(canonical_token("energy.import-total"), "energy_import_total");
        assert_eq!(canonical_token("grid__frequency"), "grid_frequency");
        assert_eq!(canonical_token("a._-b"), "a_b");
        assert_eq!(canonical_token("accumulatedConsumptionLastHour"), "accumulated_consumption_last_hour");
        assert_eq!(canonical_token("HTTPStatus"), "httpstatus");
    }

    #[test]
    fn canonical_token_is_idempotent() {
        for raw in ["PowerPhase1", "voltage-phase.3", "minPowerProduction", "x__Y"] {
            let once = canonical_token(raw);
            assert_eq!(canonical_token(&once), once);
        }
    }

    #[test]
    fn canonical_keys_normalize_to_themselves() {
        for spec in CapabilityTable::builtin().specs() {
            let m = normalize(&spec.key, &json!(1.0), None).unwrap();
            assert_eq!(m.key, spec.key);
            let again = normalize(&m.key, &json!(1.0), None).unwrap();
            assert_eq!(again.key, m.key);
        }
    }

    #[test]
    fn phase_power_maps_to_l1() {
        let m = normalize("PowerPhase1", &json!(512), None).unwrap();
        assert_eq!(m.key, "power_l1");
        assert_eq!(m.unit.as_deref(), Some("W"));
        assert_eq!(m.category, Category::Power);
        assert_eq!(m.numeric_value, Some(512.0));
    }

    #[test]
    fn watt_hours_scale_to_kilowatt_hours() {
        let m = normalize("energyImportTotal", &json!(123_456), Some("Wh")).unwrap();
        assert_eq!(m.key, "energy_total");
        assert_eq!(m.numeric_value, Some(123.456));
        assert_eq!(m.unit.as_deref(), Some("kWh"));
        assert_eq!(m.aggregation, Some(Aggregation::TotalIncreasing));

        let lower = normalize("energyImportTotal", &json!(2000), Some("wh")).unwrap();
        assert_eq!(lower.numeric_value, Some(2.0));
    }

    #[test]
    fn kilowatt_hours_pass_through() {
        let m = normalize("accumulatedConsumption", &json!(12.5), Some("kWh")).unwrap();
        assert_eq!(m.numeric_value, Some(12.5));
        let unitless = normalize("accumulatedConsumption", &json!(12.5), None).unwrap();
        assert_eq!(unitless.numeric_value, Some(12.5));
    }

    #[test]
    fn numeric_text_is_coerced() {
        let m = normalize("voltagePhase2", &json!(" 231.4 "), Some("V")).unwrap();
        assert_eq!(m.numeric_value, Some(231.4));
        assert!(m.raw_value.is_none());
    }

    #[test]
    fn known_key_with_text_keeps_raw_value() {
        let m = normalize("power", &json!("n/a"), None).unwrap();
        assert_eq!(m.numeric_value, None);
        assert_eq!(m.raw_value, Some(json!("n/a")));
    }

    #[test]
    fn unknown_numeric_passes_through() {
        let m = normalize("netConsumption", &json!(42), Some("W")).unwrap();
        assert_eq!(m.key, "net_consumption");
        assert_eq!(m.name, "netConsumption");
        assert_eq!(m.category, Category::Dimensionless);
        assert_eq!(m.unit.as_deref(), Some("W"));
    }

    #[test]
    fn unknown_non_numeric_is_unrecognized() {
        assert!(normalize("timestamp", &json!("2026-01-01T00:00:00Z"), None).is_none());
        assert!(normalize("firmware", &json!({ "v": 1 }), None).is_none());
        assert!(normalize("firmware", &json!("1.2.3"), None).is_none());
    }

    #[test]
    fn boolean_flags_pass_through_as_zero_or_one() {
        let on = normalize("relayOn", &json!(true), None).unwrap();
        assert_eq!(on.key, "relay_on");
        assert_eq!(on.numeric_value, Some(1.0));
        assert_eq!(on.category, Category::Dimensionless);
        assert_eq!(coerce_number(&json!(false)), Some(0.0));
    }

    #[test]
    fn power_factor_has_no_aggregation() {
        let m = normalize("powerFactor", &json!(0.97), None).unwrap();
        assert_eq!(m.key, "power_factor");
        assert_eq!(m.aggregation, None);
    }

    #[test]
    fn projection_first_key_wins_in_raw_id_order() {
        let snap = Snapshot::new(
            Utc::now(),
            [
                Capability::new("power", json!(100)),
                Capability::new("activePower", json!(200)),
                Capability::new("powerPhase1", json!(30)),
                Capability::new("timestamp", json!("2026-01-01T00:00:00Z")),
            ],
        );

        let projected = project(&snap);
        let keys: Vec<_> = projected.iter().map(|m| m.key.as_str()).collect();
        // "activePower" sorts before "power"; both map to power_total.
        assert_eq!(keys, vec!["power_total", "power_l1"]);
        assert_eq!(projected[0].numeric_value, Some(200.0));
    }
}
