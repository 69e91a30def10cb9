// ── Ingestion coordinator ──
//
// Per-home lifecycle: decides between piggybacking on an existing feed,
// running the realtime subscription, or polling. Holds the latest snapshot
// through the store and owns shutdown of whatever it started.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use pulsewire_api::{TelemetryClient, TransportConfig};
use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{IngestConfig, RealtimeMode};
use crate::error::CoreError;
use crate::feed::LiveFeed;
use crate::model::{CanonicalMeasurement, Snapshot, SubscriptionState};
use crate::normalize;
use crate::polling::{DeviceSource, LiveMeasurementSource, Poller};
use crate::session::SubscriptionSession;
use crate::store::{Listener, ListenerId, SnapshotStore, listener};

const REDACTED: &str = "**REDACTED**";

// ── IngestMode ───────────────────────────────────────────────────

/// How the coordinator gets its data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IngestMode {
    /// Own websocket subscription.
    Realtime { endpoint: String },
    /// Own poll loop.
    Polling {
        source: &'static str,
        interval_secs: u64,
    },
    /// Listener on a feed owned by someone else.
    Piggyback,
}

impl IngestMode {
    /// Whether this coordinator opened (and must close) the connection.
    pub fn owns_connection(&self) -> bool {
        !matches!(self, Self::Piggyback)
    }
}

impl std::fmt::Display for IngestMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Realtime { endpoint } => write!(f, "realtime ({endpoint})"),
            Self::Polling {
                source,
                interval_secs,
            } => write!(f, "polling {source} every {interval_secs}s"),
            Self::Piggyback => f.write_str("piggyback"),
        }
    }
}

// ── Diagnostics ──────────────────────────────────────────────────

/// Point-in-time report for support output. Never contains the token.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub home_id: String,
    pub device_id: Option<String>,
    pub mode: Option<IngestMode>,
    pub owns_connection: bool,
    pub state: SubscriptionState,
    pub token: &'static str,
    pub available_keys: Vec<String>,
    pub last_update: Option<DateTime<Utc>>,
    pub listener_count: usize,
    pub last_error: Option<String>,
}

// ── IngestionCoordinator ─────────────────────────────────────────

/// Entry point for one home.
///
/// Cheaply cloneable. `new` does no I/O; call [`start`](Self::start),
/// then usually [`wait_for_first_data`](Self::wait_for_first_data).
#[derive(Clone)]
pub struct IngestionCoordinator {
    inner: Arc<CoordinatorInner>,
}

struct CoordinatorInner {
    config: IngestConfig,
    store: Arc<SnapshotStore>,
    cancel: CancellationToken,
    /// Candidate feed to piggyback on.
    feed: Option<Arc<dyn LiveFeed>>,
    mode: OnceLock<IngestMode>,
    /// Our listener on a borrowed feed.
    borrowed: OnceLock<(Arc<dyn LiveFeed>, ListenerId)>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

impl IngestionCoordinator {
    pub fn new(config: IngestConfig) -> Self {
        Self::build(config, None)
    }

    /// Like [`new`](Self::new), but [`start`](Self::start) attaches to
    /// `feed` when it serves the same home.
    pub fn with_feed(config: IngestConfig, feed: Arc<dyn LiveFeed>) -> Self {
        Self::build(config, Some(feed))
    }

    fn build(config: IngestConfig, feed: Option<Arc<dyn LiveFeed>>) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                config,
                store: Arc::new(SnapshotStore::new()),
                cancel: CancellationToken::new(),
                feed,
                mode: OnceLock::new(),
                borrowed: OnceLock::new(),
                task_handles: Mutex::new(Vec::new()),
                started: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<SnapshotStore> {
        &self.inner.store
    }

    /// Selected mode, once started.
    pub fn mode(&self) -> Option<&IngestMode> {
        self.inner.mode.get()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Piggyback on the supplied feed, or open our own connection.
    ///
    /// Calling `start` on a running coordinator is a no-op; after
    /// [`stop`](Self::stop) it returns `NotReady`. A failed start can be
    /// retried.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.stopped.load(Ordering::SeqCst) {
            return Err(CoreError::not_ready("coordinator was stopped"));
        }
        if self.inner.started.swap(true, Ordering::SeqCst) {
            debug!(home_id = %self.inner.config.home_id, "Coordinator already started");
            return Ok(());
        }

        let result = match self.compatible_feed() {
            Some(feed) => self.attach(feed).await,
            None => self.start_owned().await,
        };
        if result.is_err() {
            self.inner.started.store(false, Ordering::SeqCst);
        }
        result
    }

    fn compatible_feed(&self) -> Option<Arc<dyn LiveFeed>> {
        let feed = self.inner.feed.as_ref()?;
        if feed.home_id() == self.inner.config.home_id {
            Some(Arc::clone(feed))
        } else {
            debug!(
                home_id = %self.inner.config.home_id,
                feed_home = feed.home_id(),
                "Supplied feed serves another home, not piggybacking"
            );
            None
        }
    }

    async fn attach(&self, feed: Arc<dyn LiveFeed>) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let store = &self.inner.store;
        store.set_state(SubscriptionState::Connecting);

        let attempts = config.piggyback_attempts.max(1);
        let mut ready = false;
        for attempt in 1..=attempts {
            if feed.is_ready() {
                ready = true;
                break;
            }
            if attempt == attempts {
                break;
            }
            debug!(home_id = %config.home_id, attempt, "Waiting for shared feed");
            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => {
                    return Err(CoreError::not_ready("stopped while waiting for shared feed"));
                }
                () = tokio::time::sleep(config.piggyback_interval) => {}
            }
        }
        if !ready {
            store.set_state(SubscriptionState::Idle);
            return Err(CoreError::not_ready(format!(
                "shared feed for home {} not ready after {attempts} attempts",
                config.home_id
            )));
        }

        // Read the seed before listening: an update that lands in between
        // must not be overwritten by this older snapshot.
        let seed = feed.latest();
        let sink = Arc::clone(store);
        let id = feed.add_listener(listener(move |snapshot| {
            sink.publish(snapshot);
            Ok(())
        }));
        if !seed.is_empty() && seed.timestamp > store.latest().timestamp {
            store.publish(&seed);
        }
        let _ = self.inner.mode.set(IngestMode::Piggyback);
        let _ = self.inner.borrowed.set((feed, id));
        store.set_state(SubscriptionState::Live);

        info!(home_id = %config.home_id, listener = %id, "Attached to shared realtime feed");
        Ok(())
    }

    async fn start_owned(&self) -> Result<(), CoreError> {
        let config = &self.inner.config;
        let client = self.build_client()?;

        let mode = match self.realtime_endpoint(&client).await? {
            Some(endpoint) => {
                let url = Url::parse(&endpoint).map_err(|e| CoreError::Config {
                    message: format!("invalid websocket endpoint {endpoint}: {e}"),
                })?;
                let session =
                    SubscriptionSession::new(client, url, config.home_id.clone(), config.reconnect);
                let (store, cancel) = (Arc::clone(&self.inner.store), self.inner.cancel.clone());
                self.spawn(async move { session.run(&store, &cancel).await })
                    .await;
                IngestMode::Realtime { endpoint }
            }
            None => self.spawn_poller(client).await,
        };

        info!(home_id = %config.home_id, mode = %mode, "Ingestion started");
        let _ = self.inner.mode.set(mode);
        Ok(())
    }

    fn build_client(&self) -> Result<TelemetryClient, CoreError> {
        let config = &self.inner.config;
        let endpoints = config.endpoints.to_api();
        let client = match &config.http_client {
            Some(http) => TelemetryClient::with_client(
                &endpoints,
                http.clone(),
                config.token.clone(),
                config.request_timeout,
            ),
            None => TelemetryClient::new(
                &endpoints,
                config.token.clone(),
                &TransportConfig {
                    timeout: config.request_timeout,
                    ..TransportConfig::default()
                },
            ),
        };
        client.map_err(CoreError::from)
    }

    /// Websocket endpoint to subscribe to, or `None` to poll.
    ///
    /// Transient failures of the capability check are retried with the
    /// reconnect delay until the check answers or the coordinator stops.
    async fn realtime_endpoint(&self, client: &TelemetryClient) -> Result<Option<String>, CoreError> {
        let config = &self.inner.config;
        match config.realtime {
            RealtimeMode::Never => return Ok(None),
            RealtimeMode::Always => return Ok(Some(config.endpoints.resolve_websocket(None))),
            RealtimeMode::Auto => {}
        }

        let mut attempt: u32 = 0;
        loop {
            let err = match client.realtime_info(&config.home_id).await {
                Ok(info) if info.realtime_enabled => {
                    return Ok(Some(
                        config
                            .endpoints
                            .resolve_websocket(info.websocket_url.as_deref()),
                    ));
                }
                Ok(_) => {
                    info!(home_id = %config.home_id, "Realtime not enabled for home, polling");
                    return Ok(None);
                }
                Err(e) => CoreError::from(e),
            };

            match err {
                CoreError::Authentication { .. } | CoreError::Config { .. } => {
                    self.inner.store.record_failure(err.clone());
                    return Err(err);
                }
                CoreError::RateLimited { .. } => {
                    warn!(
                        home_id = %config.home_id,
                        "Realtime info rate limited, assuming realtime on the fallback endpoint"
                    );
                    return Ok(Some(config.endpoints.resolve_websocket(None)));
                }
                CoreError::Malformed { .. } => {
                    warn!(
                        home_id = %config.home_id,
                        error = %err,
                        "Unexpected realtime info, treating home as not realtime-capable"
                    );
                    return Ok(None);
                }
                CoreError::Transient { .. } | CoreError::NotReady { .. } => {}
            }

            let delay = config.reconnect.delay_for(attempt);
            attempt = attempt.saturating_add(1);
            warn!(
                home_id = %config.home_id,
                error = %err,
                attempt,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Realtime check failed, retrying"
            );
            tokio::select! {
                biased;
                () = self.inner.cancel.cancelled() => {
                    return Err(CoreError::not_ready("stopped while checking realtime availability"));
                }
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    async fn spawn_poller(&self, client: TelemetryClient) -> IngestMode {
        let config = &self.inner.config;
        let (store, cancel) = (Arc::clone(&self.inner.store), self.inner.cancel.clone());

        match &config.device_id {
            Some(device_id) => {
                let interval = config.device_poll_interval;
                let poller = Poller::new(
                    DeviceSource::new(client, config.home_id.clone(), device_id.clone()),
                    interval,
                );
                let source = poller.source_name();
                self.spawn(async move { poller.run(&store, &cancel).await })
                    .await;
                IngestMode::Polling {
                    source,
                    interval_secs: interval.as_secs(),
                }
            }
            None => {
                let interval = config.live_poll_interval;
                let poller = Poller::new(
                    LiveMeasurementSource::new(client, config.home_id.clone()),
                    interval,
                );
                let source = poller.source_name();
                self.spawn(async move { poller.run(&store, &cancel).await })
                    .await;
                IngestMode::Polling {
                    source,
                    interval_secs: interval.as_secs(),
                }
            }
        }
    }

    async fn spawn<F>(&self, task: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        self.inner.task_handles.lock().await.push(tokio::spawn(task));
    }

    /// Wait until a snapshot has been produced.
    ///
    /// Returns `NotReady` after `timeout`, or the recorded authentication
    /// error as soon as the session or poller hits one.
    pub async fn wait_for_first_data(&self, timeout: Duration) -> Result<Arc<Snapshot>, CoreError> {
        let store = &self.inner.store;
        let mut snapshots = store.subscribe();
        let mut failures = store.subscribe_failure();

        let wait = async {
            loop {
                if store.has_data() {
                    return Ok(store.latest());
                }
                if let Some(err) = failures.borrow_and_update().clone().filter(CoreError::is_auth) {
                    return Err(err);
                }
                if self.inner.stopped.load(Ordering::SeqCst) {
                    return Err(CoreError::not_ready("coordinator was stopped"));
                }
                tokio::select! {
                    changed = snapshots.changed() => {
                        if changed.is_err() {
                            return Err(CoreError::not_ready("snapshot channel closed"));
                        }
                    }
                    _ = failures.changed() => {}
                    () = self.inner.cancel.cancelled() => {}
                }
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            CoreError::not_ready(format!(
                "no data for home {} within {}s",
                self.inner.config.home_id,
                timeout.as_secs()
            ))
        })?
    }

    /// [`wait_for_first_data`](Self::wait_for_first_data) with the
    /// configured timeout.
    pub async fn wait_for_first_data_default(&self) -> Result<Arc<Snapshot>, CoreError> {
        self.wait_for_first_data(self.inner.config.first_data_timeout)
            .await
    }

    /// Tear down what this coordinator started. Idempotent.
    ///
    /// Owned: the session sends its stop frame and closes the socket,
    /// background tasks are awaited. Borrowed: only our listener is removed;
    /// the shared feed keeps running.
    pub async fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.cancel.cancel();

        if let Some((feed, id)) = self.inner.borrowed.get() {
            if !feed.remove_listener(*id) {
                debug!(listener = %id, "Listener already gone from shared feed");
            }
        }

        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            if let Err(e) = handle.await {
                warn!(error = %e, "Ingestion task ended abnormally");
            }
        }

        self.inner.store.set_state(SubscriptionState::Stopped);
        info!(home_id = %self.inner.config.home_id, "Ingestion stopped");
    }

    // ── Data access ──────────────────────────────────────────────

    /// Latest snapshot, empty before the first arrival.
    pub fn get_latest(&self) -> Arc<Snapshot> {
        self.inner.store.latest()
    }

    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        self.inner.store.add_listener(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.inner.store.remove_listener(id)
    }

    /// Every raw capability id seen so far, sorted. Never shrinks.
    pub fn known_capabilities(&self) -> Vec<String> {
        self.inner.store.known_keys()
    }

    /// Latest snapshot run through the built-in capability table.
    pub fn measurements(&self) -> Vec<CanonicalMeasurement> {
        normalize::project(&self.inner.store.latest())
    }

    pub fn state(&self) -> SubscriptionState {
        self.inner.store.state()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SubscriptionState> {
        self.inner.store.subscribe_state()
    }

    /// Stream of snapshots, starting with the current one.
    pub fn snapshots(&self) -> WatchStream<Arc<Snapshot>> {
        self.inner.store.stream()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        let store = &self.inner.store;
        let mode = self.inner.mode.get().cloned();
        Diagnostics {
            home_id: self.inner.config.home_id.clone(),
            device_id: self.inner.config.device_id.clone(),
            owns_connection: mode.as_ref().is_some_and(IngestMode::owns_connection),
            mode,
            state: store.state(),
            token: REDACTED,
            available_keys: store.known_keys(),
            last_update: store.latest().timestamp,
            listener_count: store.listener_count(),
            last_error: store.failure().map(|e| e.to_string()),
        }
    }
}

impl LiveFeed for IngestionCoordinator {
    fn home_id(&self) -> &str {
        &self.inner.config.home_id
    }

    fn is_ready(&self) -> bool {
        self.inner.started.load(Ordering::SeqCst)
            && !self.inner.stopped.load(Ordering::SeqCst)
            && self.inner.store.state().is_live()
    }

    fn latest(&self) -> Arc<Snapshot> {
        self.get_latest()
    }

    fn add_listener(&self, listener: Listener) -> ListenerId {
        IngestionCoordinator::add_listener(self, listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        IngestionCoordinator::remove_listener(self, id)
    }
}
