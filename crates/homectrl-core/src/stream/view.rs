use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use super::{ConnectionState, Snapshot};
use crate::model::TopicRecord;

/// Read-only access to one topic's snapshots.
///
/// Provides both point-in-time access and change notification via
/// [`changed`](Self::changed) or by converting into a `Stream`.
pub struct SnapshotView<T: TopicRecord> {
    current: Arc<Snapshot<T>>,
    receiver: watch::Receiver<Arc<Snapshot<T>>>,
    state: watch::Receiver<ConnectionState>,
}

impl<T: TopicRecord> Clone for SnapshotView<T> {
    fn clone(&self) -> Self {
        Self {
            current: Arc::clone(&self.current),
            receiver: self.receiver.clone(),
            state: self.state.clone(),
        }
    }
}

impl<T: TopicRecord> SnapshotView<T> {
    pub(crate) fn new(
        receiver: watch::Receiver<Arc<Snapshot<T>>>,
        state: watch::Receiver<ConnectionState>,
    ) -> Self {
        let current = receiver.borrow().clone();
        Self {
            current,
            receiver,
            state,
        }
    }

    /// The snapshot captured at creation time or at the last `changed()`.
    pub fn current(&self) -> &Arc<Snapshot<T>> {
        &self.current
    }

    /// The latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Arc<Snapshot<T>> {
        self.receiver.borrow().clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait for the next replacement, returning the new snapshot.
    /// Returns `None` once the stream has been dropped.
    pub async fn changed(&mut self) -> Option<Arc<Snapshot<T>>> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = Arc::clone(&snap);
        Some(snap)
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    pub fn into_stream(self) -> SnapshotWatchStream<T> {
        SnapshotWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter yielding each new snapshot of a topic.
pub struct SnapshotWatchStream<T: TopicRecord> {
    inner: WatchStream<Arc<Snapshot<T>>>,
}

impl<T: TopicRecord> Stream for SnapshotWatchStream<T> {
    type Item = Arc<Snapshot<T>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        // Arc<Snapshot<T>> is Unpin, so WatchStream is too.
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
