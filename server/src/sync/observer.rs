//! Push-based observers of collection state.

use std::sync::Arc;

use livesync_engine::CollectionSnapshot;

/// Receives a snapshot after every state transition of a resource.
///
/// Called from the resource's synchronizer task, so implementations must not
/// block.
pub trait Observer: Send + Sync {
    fn on_update(&self, snapshot: &CollectionSnapshot);
}

impl<F> Observer for F
where
    F: Fn(&CollectionSnapshot) + Send + Sync,
{
    fn on_update(&self, snapshot: &CollectionSnapshot) {
        self(snapshot)
    }
}

/// Observer shared between synchronizers.
pub type SharedObserver = Arc<dyn Observer>;
