// ── Domain model ──
//
// Provider-neutral types shared by the ingestion engine and its consumers.
// Raw snapshots keep vendor field names; `CanonicalMeasurement` is what the
// normalizer produces from them.

pub mod home;
pub mod measurement;
pub mod snapshot;
pub mod state;

pub use home::{Device, Home};
pub use measurement::{Aggregation, CanonicalMeasurement, Category};
pub use snapshot::{Capability, Snapshot};
pub use state::SubscriptionState;
