use std::collections::HashMap;
use std::sync::LazyLock;

use crate::error::CoreError;
use crate::model::{Aggregation, Category};

use super::canonical_token;

/// Unit string that triggers Wh→kWh scaling.
pub(crate) const KILOWATT_HOURS: &str = "kWh";

/// Description of one canonical sensor key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasurementSpec {
    pub key: String,
    pub name: String,
    pub aliases: Vec<String>,
    pub unit: Option<String>,
    pub category: Category,
    pub aggregation: Option<Aggregation>,
}

impl MeasurementSpec {
    /// An instantaneous measurement with no aliases and no unit.
    pub fn new(key: &str, name: &str, category: Category) -> Self {
        Self {
            key: key.to_owned(),
            name: name.to_owned(),
            aliases: Vec::new(),
            unit: None,
            category,
            aggregation: Some(Aggregation::Instantaneous),
        }
    }

    #[must_use]
    pub fn aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases.extend(aliases.iter().map(|a| (*a).to_owned()));
        self
    }

    #[must_use]
    pub fn unit(mut self, unit: &str) -> Self {
        self.unit = Some(unit.to_owned());
        self
    }

    #[must_use]
    pub fn aggregation(mut self, aggregation: Option<Aggregation>) -> Self {
        self.aggregation = aggregation;
        self
    }
}

/// Alias lookup over a set of [`MeasurementSpec`]s.
#[derive(Debug, Clone)]
pub struct CapabilityTable {
    specs: Vec<MeasurementSpec>,
    by_alias: HashMap<String, usize>,
}

impl CapabilityTable {
    /// Index `specs` by alias.
    ///
    /// Every key is registered as an alias of its own spec and every alias
    /// is run through [`canonical_token`]. Two specs claiming the same
    /// alias is a [`CoreError::Config`].
    pub fn new(specs: Vec<MeasurementSpec>) -> Result<Self, CoreError> {
        let mut by_alias: HashMap<String, usize> = HashMap::new();

        for (index, spec) in specs.iter().enumerate() {
            let own = std::iter::once(spec.key.as_str()).chain(spec.aliases.iter().map(String::as_str));
            for alias in own {
                let token = canonical_token(alias);
                match by_alias.get(&token) {
                    Some(&existing) if existing != index => {
                        return Err(CoreError::Config {
                            message: format!(
                                "alias `{token}` claimed by both `{}` and `{}`",
                                specs[existing].key, spec.key
                            ),
                        });
                    }
                    Some(_) => {}
                    None => {
                        by_alias.insert(token, index);
                    }
                }
            }
        }

        Ok(Self { specs, by_alias })
    }

    /// The table shipped with the crate.
    pub fn builtin() -> &'static CapabilityTable {
        &BUILTIN
    }

    /// Look up a canonical token.
    pub fn lookup(&self, token: &str) -> Option<&MeasurementSpec> {
        self.by_alias.get(token).and_then(|&i| self.specs.get(i))
    }

    pub fn specs(&self) -> &[MeasurementSpec] {
        &self.specs
    }
}

static BUILTIN: LazyLock<CapabilityTable> = LazyLock::new(|| {
    // Alias sets below are disjoint; a collision would surface as an empty
    // table plus an error log rather than a panic.
    CapabilityTable::new(builtin_specs()).unwrap_or_else(|e| {
        tracing::error!(error = %e, "built-in capability table is inconsistent");
        CapabilityTable {
            specs: Vec::new(),
            by_alias: HashMap::new(),
        }
    })
});

fn phase_specs(
    quantity: &str,
    label: &str,
    unit: &str,
    category: Category,
    alias_patterns: [&str; 3],
) -> Vec<MeasurementSpec> {
    (1..=3)
        .map(|n| {
            let aliases: Vec<String> = alias_patterns
                .iter()
                .map(|p| p.replace('N', &n.to_string()))
                .collect();
            let alias_refs: Vec<&str> = aliases.iter().map(String::as_str).collect();
            MeasurementSpec::new(&format!("{quantity}_l{n}"), &format!("{label} L{n}"), category)
                .aliases(&alias_refs)
                .unit(unit)
        })
        .collect()
}

fn builtin_specs() -> Vec<MeasurementSpec> {
    let mut specs = vec![
        MeasurementSpec::new("power_total", "Power Total", Category::Power)
            .aliases(&["power", "power_import", "active_power", "power_net"])
            .unit("W"),
        MeasurementSpec::new("power_export", "Power Export", Category::Power)
            .aliases(&["power_production", "active_power_export"])
            .unit("W"),
        MeasurementSpec::new("energy_total", "Energy Imported", Category::Energy)
            .aliases(&[
                "accumulated_consumption",
                "energy_import_total",
                "last_meter_consumption",
            ])
            .unit(KILOWATT_HOURS)
            .aggregation(Some(Aggregation::TotalIncreasing)),
        MeasurementSpec::new("energy_export_total", "Energy Exported", Category::Energy)
            .aliases(&["accumulated_production", "last_meter_production"])
            .unit(KILOWATT_HOURS)
            .aggregation(Some(Aggregation::TotalIncreasing)),
        MeasurementSpec::new("energy_last_hour", "Energy Imported This Hour", Category::Energy)
            .aliases(&["accumulated_consumption_last_hour"])
            .unit(KILOWATT_HOURS)
            .aggregation(Some(Aggregation::TotalIncreasing)),
        MeasurementSpec::new(
            "energy_export_last_hour",
            "Energy Exported This Hour",
            Category::Energy,
        )
        .aliases(&["accumulated_production_last_hour"])
        .unit(KILOWATT_HOURS)
        .aggregation(Some(Aggregation::TotalIncreasing)),
        MeasurementSpec::new("power_min", "Power Minimum", Category::Power)
            .aliases(&["min_power"])
            .unit("W"),
        MeasurementSpec::new("power_max", "Power Maximum", Category::Power)
            .aliases(&["max_power"])
            .unit("W"),
        MeasurementSpec::new("power_export_min", "Power Export Minimum", Category::Power)
            .aliases(&["min_power_production"])
            .unit("W"),
        MeasurementSpec::new("power_export_max", "Power Export Maximum", Category::Power)
            .aliases(&["max_power_production"])
            .unit("W"),
    ];

    specs.extend(phase_specs(
        "power",
        "Power",
        "W",
        Category::Power,
        ["power_phaseN", "power_lN", "phaseN_power"],
    ));
    specs.extend(phase_specs(
        "voltage",
        "Voltage",
        "V",
        Category::Voltage,
        ["voltage_phaseN", "voltage_lN", "phaseN_voltage"],
    ));
    specs.extend(phase_specs(
        "current",
        "Current",
        "A",
        Category::Current,
        ["current_lN", "phaseN_current", "current_phaseN"],
    ));

    specs.extend([
        MeasurementSpec::new("power_factor", "Power Factor", Category::Dimensionless)
            .aggregation(None),
        MeasurementSpec::new("frequency", "Grid Frequency", Category::Frequency)
            .aliases(&["grid_frequency"])
            .unit("Hz"),
        MeasurementSpec::new("temperature", "Device Temperature", Category::Temperature)
            .unit("°C"),
        MeasurementSpec::new("signal_strength", "Signal Strength", Category::Dimensionless),
    ]);

    specs
}
