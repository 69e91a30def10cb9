// ── Polling fallback ──
//
// Used when the home has no realtime subscription. A `SnapshotSource`
// fetches one snapshot per tick; the poller publishes it into the store.
// Failures are logged and never stop the loop.

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use pulsewire_api::TelemetryClient;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::CoreError;
use crate::model::{Snapshot, SubscriptionState};
use crate::store::SnapshotStore;

/// Something that yields one snapshot per request.
pub trait SnapshotSource: Send + Sync {
    /// Short label for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// `Ok(None)` means the service answered without data.
    fn fetch(&self) -> impl Future<Output = Result<Option<Snapshot>, CoreError>> + Send;
}

/// Data API device capabilities.
pub struct DeviceSource {
    client: TelemetryClient,
    home_id: String,
    device_id: String,
}

impl DeviceSource {
    pub fn new(client: TelemetryClient, home_id: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            client,
            home_id: home_id.into(),
            device_id: device_id.into(),
        }
    }
}

impl SnapshotSource for DeviceSource {
    fn name(&self) -> &'static str {
        "device"
    }

    async fn fetch(&self) -> Result<Option<Snapshot>, CoreError> {
        let device = self
            .client
            .get_device_snapshot(&self.home_id, &self.device_id)
            .await?;
        let snapshot = Snapshot::from_device(&device, Utc::now());
        Ok((!snapshot.is_empty()).then_some(snapshot))
    }
}

/// GraphQL `liveMeasurement` query.
pub struct LiveMeasurementSource {
    client: TelemetryClient,
    home_id: String,
}

impl LiveMeasurementSource {
    pub fn new(client: TelemetryClient, home_id: impl Into<String>) -> Self {
        Self {
            client,
            home_id: home_id.into(),
        }
    }
}

impl SnapshotSource for LiveMeasurementSource {
    fn name(&self) -> &'static str {
        "live_measurement"
    }

    async fn fetch(&self) -> Result<Option<Snapshot>, CoreError> {
        let payload = self.client.live_measurement(&self.home_id).await?;
        Ok(payload
            .map(|m| Snapshot::from_live_measurement(&m, Utc::now()))
            .filter(|s| !s.is_empty()))
    }
}

/// Periodic poll of a [`SnapshotSource`].
pub struct Poller<S> {
    source: S,
    interval: Duration,
}

impl<S: SnapshotSource> Poller<S> {
    pub fn new(source: S, interval: Duration) -> Self {
        Self {
            source,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn source_name(&self) -> &'static str {
        self.source.name()
    }

    /// Poll until cancelled. The first poll happens immediately.
    ///
    /// A successful poll moves the state to `Live`; an authentication
    /// failure is recorded as `Failed` but polling continues, so a token
    /// fixed on the service side recovers without a restart.
    pub async fn run(&self, store: &SnapshotStore, cancel: &CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        store.set_state(SubscriptionState::Connecting);

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = self.source.fetch() => result,
            };

            match result {
                Ok(Some(snapshot)) => {
                    store.publish(&snapshot);
                    store.clear_failure();
                    store.set_state(SubscriptionState::Live);
                }
                Ok(None) => debug!(source = self.source.name(), "Poll returned no data"),
                Err(e) if e.is_auth() => {
                    error!(source = self.source.name(), error = %e, "Poll rejected");
                    store.record_failure(e);
                }
                Err(e) => warn!(source = self.source.name(), error = %e, "Poll failed"),
            }
        }

        store.set_state(SubscriptionState::Stopped);
    }
}
