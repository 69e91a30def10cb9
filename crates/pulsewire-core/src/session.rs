// ── Realtime subscription session ──
//
// Owns one websocket at a time and drives the subscription state machine:
// connect, subscribe, read frames into the store, and reconnect after a
// fixed (or capped exponential) delay. Authentication failures are
// terminal; everything else is retried until cancelled.

use chrono::Utc;
use pulsewire_api::{ServerMessage, TelemetryClient};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::ReconnectConfig;
use crate::error::CoreError;
use crate::model::{Snapshot, SubscriptionState};
use crate::store::SnapshotStore;

/// How one connection cycle ended without an error.
enum ConnectionEnd {
    Cancelled,
    /// Server closed the socket or completed the subscription.
    Dropped(&'static str),
}

/// Live measurement subscription for one home.
///
/// Connections are opened through the [`TelemetryClient`], which carries
/// the token and the handshake timeout.
pub struct SubscriptionSession {
    client: TelemetryClient,
    ws_url: Url,
    home_id: String,
    reconnect: ReconnectConfig,
}

impl SubscriptionSession {
    pub fn new(
        client: TelemetryClient,
        ws_url: Url,
        home_id: impl Into<String>,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            client,
            ws_url,
            home_id: home_id.into(),
            reconnect,
        }
    }

    /// Run until `cancel` fires or authentication is rejected.
    ///
    /// Ends in [`SubscriptionState::Stopped`] on cancellation and in
    /// [`SubscriptionState::Failed`] (with the error recorded on the
    /// store) on an authentication failure.
    pub async fn run(&self, store: &SnapshotStore, cancel: &CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                break;
            }
            store.set_state(SubscriptionState::Connecting);

            let mut reached_live = false;
            let result = self.connect_and_read(store, cancel, &mut reached_live).await;
            if reached_live {
                attempt = 0;
            }

            let retry_after = match result {
                Ok(ConnectionEnd::Cancelled) => break,
                Ok(ConnectionEnd::Dropped(reason)) => {
                    tracing::info!(home_id = %self.home_id, reason, "Subscription dropped, reconnecting");
                    None
                }
                Err(e) if e.is_auth() => {
                    tracing::error!(home_id = %self.home_id, error = %e, "Subscription rejected, giving up");
                    store.record_failure(e);
                    return;
                }
                Err(CoreError::RateLimited { retry_after, .. }) => {
                    tracing::warn!(home_id = %self.home_id, attempt, "Subscription rate limited");
                    retry_after
                }
                Err(e) => {
                    tracing::warn!(home_id = %self.home_id, error = %e, attempt, "Subscription error");
                    None
                }
            };

            let delay = retry_after.map_or_else(
                || self.reconnect.delay_for(attempt),
                |after| after.max(self.reconnect.delay_for(attempt)),
            );
            attempt = attempt.saturating_add(1);
            let next_retry_at = Utc::now()
                + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            store.set_state(SubscriptionState::Reconnecting {
                attempt,
                next_retry_at,
            });
            tracing::info!(
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                attempt,
                "Waiting before reconnect"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(delay) => {}
            }
        }

        store.set_state(SubscriptionState::Stopped);
        tracing::debug!(home_id = %self.home_id, "Subscription loop exiting");
    }

    // ── Single connection lifecycle ──────────────────────────────────

    /// Open the subscription and read frames until the socket drops.
    ///
    /// Every await point races `cancel` so a stop always reaches the
    /// close path (stop frame, then close frame) once connected.
    async fn connect_and_read(
        &self,
        store: &SnapshotStore,
        cancel: &CancellationToken,
        reached_live: &mut bool,
    ) -> Result<ConnectionEnd, CoreError> {
        let mut conn = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(ConnectionEnd::Cancelled),
            conn = self.client.open_subscription(&self.ws_url, &self.home_id) => conn?,
        };

        *reached_live = true;
        store.set_state(SubscriptionState::Live);

        let mut warned_malformed = false;
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    if let Err(e) = conn.close().await {
                        tracing::debug!(error = %e, "Subscription close was not clean");
                    }
                    return Ok(ConnectionEnd::Cancelled);
                }
                next = conn.next_message() => next,
            };

            let message = match next {
                None => return Ok(ConnectionEnd::Dropped("socket closed")),
                Some(Ok(message)) => message,
                Some(Err(pulsewire_api::Error::Deserialization { message, .. })) => {
                    if warned_malformed {
                        tracing::debug!(error = %message, "Skipping malformed frame");
                    } else {
                        tracing::warn!(error = %message, "Skipping malformed frame");
                        warned_malformed = true;
                    }
                    continue;
                }
                Some(Err(e)) => return Err(e.into()),
            };

            match message {
                ServerMessage::Data { measurement, .. } => {
                    if measurement.is_empty() {
                        tracing::debug!("Empty measurement frame");
                        continue;
                    }
                    let snapshot = Snapshot::from_live_measurement(&measurement, Utc::now());
                    store.publish(&snapshot);
                }
                message @ (ServerMessage::Error { .. } | ServerMessage::ConnectionError { .. }) => {
                    if let Some(err) = message.into_error() {
                        return Err(err.into());
                    }
                }
                ServerMessage::Complete { .. } => {
                    return Ok(ConnectionEnd::Dropped("subscription completed"));
                }
                ServerMessage::ConnectionAck => tracing::debug!("Subscription acknowledged"),
                ServerMessage::KeepAlive => tracing::trace!("Subscription keep-alive"),
                ServerMessage::Unknown { kind } => {
                    tracing::debug!(kind = %kind, "Ignoring unknown frame type");
                }
            }
        }
    }
}
