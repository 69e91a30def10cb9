// ── Listener registry ──
//
// Callbacks run inline on the producing task, one call per published
// snapshot. A listener that errors or panics is logged and skipped; the
// rest still get the snapshot.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tracing::{error, warn};

use crate::model::Snapshot;

pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Snapshot callback. Must not block.
pub type Listener = Arc<dyn Fn(&Arc<Snapshot>) -> Result<(), ListenerError> + Send + Sync>;

/// Box a closure as a [`Listener`].
pub fn listener<F>(f: F) -> Listener
where
    F: Fn(&Arc<Snapshot>) -> Result<(), ListenerError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handle returned by `add_listener`, used to remove it again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener-{}", self.0)
    }
}

#[derive(Default)]
pub(crate) struct ListenerSet {
    next_id: AtomicU64,
    entries: DashMap<ListenerId, Listener>,
}

impl ListenerSet {
    pub(crate) fn add(&self, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries.insert(id, listener);
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Call every listener once, in registration order.
    ///
    /// The registry is not locked while callbacks run, so a callback may
    /// add or remove listeners (including itself).
    pub(crate) fn notify(&self, snapshot: &Arc<Snapshot>) {
        let mut current: Vec<(ListenerId, Listener)> = self
            .entries
            .iter()
            .map(|e| (*e.key(), Arc::clone(e.value())))
            .collect();
        current.sort_by_key(|(id, _)| *id);

        for (id, listener) in current {
            match catch_unwind(AssertUnwindSafe(|| listener(snapshot))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(listener = %id, error = %e, "listener failed"),
                Err(_) => error!(listener = %id, "listener panicked"),
            }
        }
    }
}
