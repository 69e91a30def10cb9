use std::sync::Arc;

use crate::model::Snapshot;
use crate::store::{Listener, ListenerId};

/// A running realtime feed another component can attach to.
///
/// Used for piggybacking: when the host already runs a subscription for a
/// home, a second coordinator registers a listener on it instead of
/// opening its own socket. Object safe so hosts can hand out
/// `Arc<dyn LiveFeed>`.
pub trait LiveFeed: Send + Sync {
    fn home_id(&self) -> &str;

    /// Whether the feed is currently delivering data.
    fn is_ready(&self) -> bool;

    /// Latest merged snapshot (empty before the first update).
    fn latest(&self) -> Arc<Snapshot>;

    fn add_listener(&self, listener: Listener) -> ListenerId;

    /// Returns `false` when `id` was not registered.
    fn remove_listener(&self, id: ListenerId) -> bool;
}
