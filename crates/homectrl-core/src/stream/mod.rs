// ── Snapshot streams ──
//
// One stream per subscribed topic. The stream's pump task is its only
// writer; every reader holds an `Arc<Snapshot<T>>` that is never mutated.

mod snapshot;
mod subscription;
mod view;

pub use snapshot::{Applied, Snapshot, SnapshotStream};
pub use subscription::Subscription;
pub(crate) use subscription::{FeedSink, FeedTask, spawn_feed};
pub use view::{SnapshotView, SnapshotWatchStream};

/// Connection state of one topic stream, observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Subscribed, first connection attempt in flight.
    Connecting,
    Connected,
    /// The channel dropped; data is stale (the snapshot was reset).
    Reconnecting { attempt: u32 },
    /// Unsubscribed. Terminal.
    Closed,
}
