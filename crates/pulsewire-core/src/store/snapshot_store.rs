use std::sync::Arc;

use dashmap::DashSet;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::listeners::{Listener, ListenerId, ListenerSet};
use crate::error::CoreError;
use crate::model::{Snapshot, SubscriptionState};

/// Holds the latest snapshot and fans updates out.
///
/// Updates merge into the previous snapshot: values are replaced, raw
/// ids missing from an update are kept. The known-key set only grows.
///
/// The store also carries the feed state, so producers (subscription
/// session, poller, piggyback listener) and readers share one handle.
pub struct SnapshotStore {
    latest: watch::Sender<Arc<Snapshot>>,
    state: watch::Sender<SubscriptionState>,
    failure: watch::Sender<Option<CoreError>>,
    known_keys: DashSet<String>,
    listeners: ListenerSet,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(Arc::new(Snapshot::empty()));
        let (state, _) = watch::channel(SubscriptionState::Idle);
        let (failure, _) = watch::channel(None);
        Self {
            latest,
            state,
            failure,
            known_keys: DashSet::new(),
            listeners: ListenerSet::default(),
        }
    }

    /// Merge `update` and notify listeners. Empty updates are ignored and
    /// return `None`.
    pub fn publish(&self, update: &Snapshot) -> Option<Arc<Snapshot>> {
        if update.is_empty() {
            return None;
        }

        for id in update.raw_ids() {
            if !self.known_keys.contains(id) {
                self.known_keys.insert(id.to_owned());
            }
        }

        let merged = Arc::new(self.latest.borrow().merged_with(update));
        self.latest.send_replace(Arc::clone(&merged));
        self.listeners.notify(&merged);
        Some(merged)
    }

    /// Latest snapshot (empty before the first publish).
    pub fn latest(&self) -> Arc<Snapshot> {
        Arc::clone(&self.latest.borrow())
    }

    pub fn has_data(&self) -> bool {
        !self.latest.borrow().is_empty()
    }

    /// Every raw id seen since creation, sorted.
    pub fn known_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.known_keys.iter().map(|k| k.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot>> {
        self.latest.subscribe()
    }

    /// Stream of snapshots, starting with the current one.
    pub fn stream(&self) -> WatchStream<Arc<Snapshot>> {
        WatchStream::new(self.latest.subscribe())
    }

    // ── Feed state ───────────────────────────────────────────────────

    pub fn state(&self) -> SubscriptionState {
        self.state.borrow().clone()
    }

    pub fn set_state(&self, state: SubscriptionState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                tracing::debug!(from = %current, to = %state, "Feed state change");
                *current = state;
                true
            }
        });
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SubscriptionState> {
        self.state.subscribe()
    }

    /// Record a failure and move to [`SubscriptionState::Failed`].
    pub fn record_failure(&self, err: CoreError) {
        self.set_state(SubscriptionState::Failed {
            reason: err.to_string(),
        });
        self.failure.send_replace(Some(err));
    }

    pub fn clear_failure(&self) {
        self.failure.send_if_modified(|f| f.take().is_some());
    }

    /// Last recorded failure, if it has not been cleared.
    pub fn failure(&self) -> Option<CoreError> {
        self.failure.borrow().clone()
    }

    pub fn subscribe_failure(&self) -> watch::Receiver<Option<CoreError>> {
        self.failure.subscribe()
    }

    // ── Listeners ────────────────────────────────────────────────────

    pub fn add_listener(&self, listener: Listener) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::Capability;
    use crate::store::listener;

    fn snap(fields: &[(&str, i64)]) -> Snapshot {
        Snapshot::new(
            Utc::now(),
            fields.iter().map(|(k, v)| Capability::new(*k, json!(v))),
        )
    }

    #[test]
    fn empty_update_is_ignored() {
        let store = SnapshotStore::new();
        assert!(store.publish(&Snapshot::empty()).is_none());
        assert!(!store.has_data());
    }

    #[test]
    fn known_keys_only_grow() {
        let store = SnapshotStore::new();
        store.publish(&snap(&[("power", 1), ("powerPhase1", 2)]));
        store.publish(&snap(&[("power", 3)]));

        assert_eq!(store.known_keys(), vec!["power", "powerPhase1"]);
        let latest = store.latest();
        assert_eq!(latest.get("power").unwrap().value, json!(3));
        assert_eq!(latest.get("powerPhase1").unwrap().value, json!(2));
    }

    #[test]
    fn failing_listener_does_not_block_others() {
        let store = SnapshotStore::new();
        let delivered = Arc::new(AtomicUsize::new(0));

        store.add_listener(listener(|_| Err("listener broke".into())));
        store.add_listener(listener(|_| panic!("listener exploded")));
        let counter = Arc::clone(&delivered);
        store.add_listener(listener(move |s| {
            assert!(s.get("power").is_some());
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        store.publish(&snap(&[("power", 1)]));
        store.publish(&snap(&[("power", 2)]));
        assert_eq!(delivered.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn removed_listener_stops_receiving() {
        let store = SnapshotStore::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = store.add_listener(listener(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }));

        store.publish(&snap(&[("power", 1)]));
        assert!(store.remove_listener(id));
        assert!(!store.remove_listener(id));
        store.publish(&snap(&[("power", 2)]));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn failure_moves_state_and_clears() {
        let store = SnapshotStore::new();
        assert_eq!(store.state(), SubscriptionState::Idle);

        store.record_failure(CoreError::Authentication {
            message: "bad token".into(),
        });
        assert!(matches!(store.state(), SubscriptionState::Failed { .. }));
        assert!(store.failure().unwrap().is_auth());

        store.set_state(SubscriptionState::Live);
        store.clear_failure();
        assert!(store.failure().is_none());
        assert!(store.state().is_live());
    }

    #[test]
    fn subscribers_see_latest() {
        let store = SnapshotStore::new();
        let rx = store.subscribe();
        store.publish(&snap(&[("power", 9)]));
        assert_eq!(rx.borrow().get("power").unwrap().value, json!(9));
    }
}
