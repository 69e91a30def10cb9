// ── Snapshot store ──
//
// Latest merged snapshot, the set of raw ids ever seen, and the listener
// registry that fans each new snapshot out to consumers.

mod listeners;
mod snapshot_store;

pub use listeners::{Listener, ListenerError, ListenerId, listener};
pub use snapshot_store::SnapshotStore;
