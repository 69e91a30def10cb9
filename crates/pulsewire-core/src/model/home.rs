use serde::Serialize;

use super::Capability;

/// A home visible to the token. Immutable for a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Home {
    pub id: String,
    pub display_name: String,
    pub realtime_capable: bool,
}

/// A metering device attached to a home.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub id: String,
    pub home_id: String,
    pub label: String,
    pub capabilities: Vec<Capability>,
}
