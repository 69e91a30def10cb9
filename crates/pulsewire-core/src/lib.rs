//! Realtime ingestion engine between `pulsewire-api` and consumers.
//!
//! - **[`IngestionCoordinator`]**: per-home facade.
//!   [`start()`](IngestionCoordinator::start) piggybacks on a supplied
//!   [`LiveFeed`], or opens its own realtime subscription, or polls when the
//!   home has no realtime stream. [`wait_for_first_data()`](IngestionCoordinator::wait_for_first_data)
//!   bounds startup; [`stop()`](IngestionCoordinator::stop) tears down only
//!   what the coordinator owns.
//!
//! - **[`SubscriptionSession`]**: websocket state machine with reconnect.
//!
//! - **[`Poller`]**: fixed-interval fallback over a [`SnapshotSource`].
//!
//! - **[`SnapshotStore`]**: merged latest snapshot, known keys, feed state
//!   and listener fan-out on `tokio::sync::watch` + `DashMap`.
//!
//! - **Normalization** ([`normalize`]): pure mapping of vendor field names
//!   onto canonical sensor keys, applied by consumers via
//!   [`IngestionCoordinator::measurements`].

pub mod config;
pub mod convert;
pub mod coordinator;
pub mod error;
pub mod feed;
pub mod model;
pub mod normalize;
pub mod polling;
pub mod session;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{Endpoints, IngestConfig, RealtimeMode, ReconnectConfig};
pub use coordinator::{Diagnostics, IngestMode, IngestionCoordinator};
pub use error::CoreError;
pub use feed::LiveFeed;
pub use model::{
    Aggregation, CanonicalMeasurement, Capability, Category, Device, Home, Snapshot,
    SubscriptionState,
};
pub use normalize::{CapabilityTable, MeasurementSpec};
pub use polling::{DeviceSource, LiveMeasurementSource, Poller, SnapshotSource};
pub use session::SubscriptionSession;
pub use store::{Listener, ListenerError, ListenerId, SnapshotStore, listener};
