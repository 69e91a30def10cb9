use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One vendor-named measurement, as delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capability {
    pub raw_id: String,
    pub value: Value,
    pub unit: Option<String>,
    pub description: Option<String>,
}

impl Capability {
    pub fn new(raw_id: impl Into<String>, value: Value) -> Self {
        Self {
            raw_id: raw_id.into(),
            value,
            unit: None,
            description: None,
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }
}

/// Latest known values keyed by raw id.
///
/// `timestamp` is `None` only for the empty snapshot handed out before
/// any data arrived.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub timestamp: Option<DateTime<Utc>>,
    pub capabilities: BTreeMap<String, Capability>,
}

impl Snapshot {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a capability list. Raw ids are unique: the first entry
    /// for an id wins.
    pub fn new(timestamp: DateTime<Utc>, capabilities: impl IntoIterator<Item = Capability>) -> Self {
        let mut map = BTreeMap::new();
        for capability in capabilities {
            map.entry(capability.raw_id.clone()).or_insert(capability);
        }
        Self {
            timestamp: Some(timestamp),
            capabilities: map,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn get(&self, raw_id: &str) -> Option<&Capability> {
        self.capabilities.get(raw_id)
    }

    pub fn raw_ids(&self) -> impl Iterator<Item = &str> {
        self.capabilities.keys().map(String::as_str)
    }

    /// Overlay `update` on `self`. Values present in `update` replace
    /// ours; ids it lacks are kept. The timestamp is the newer of the two.
    #[must_use]
    pub fn merged_with(&self, update: &Snapshot) -> Snapshot {
        let mut capabilities = self.capabilities.clone();
        for (id, capability) in &update.capabilities {
            capabilities.insert(id.clone(), capability.clone());
        }
        Snapshot {
            timestamp: self.timestamp.max(update.timestamp),
            capabilities,
        }
    }
}
