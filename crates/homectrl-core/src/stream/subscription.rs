// ── Subscription lifecycle ──
//
// A subscription owns one push channel and one snapshot stream. The pump
// task moves feed events into the stream until cancelled; dropping the
// subscription cancels the pump and closes the stream.

use std::sync::Arc;

use homectrl_api::{FeedEvent, TopicFeed};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Snapshot, SnapshotStream, SnapshotView};
use crate::model::TopicRecord;
use crate::topic::Topic;

/// Receiver of feed events for one topic.
pub(crate) trait FeedSink: Send + Sync + 'static {
    fn apply_event(&self, event: FeedEvent);
    fn close(&self);
}

impl<T: TopicRecord> FeedSink for SnapshotStream<T> {
    fn apply_event(&self, event: FeedEvent) {
        self.apply(event);
    }

    fn close(&self) {
        SnapshotStream::close(self);
    }
}

/// A running pump task and the token that stops it.
pub(crate) struct FeedTask {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl FeedTask {
    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Cancel and wait for the pump to exit.
    pub(crate) async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for FeedTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn the pump for `feed` writing into `sink`.
///
/// The sink is closed when the pump exits, whichever side ended it.
pub(crate) fn spawn_feed<S: FeedSink>(
    feed: TopicFeed,
    sink: Arc<S>,
    cancel: CancellationToken,
) -> FeedTask {
    let handle = tokio::spawn(pump(feed, sink, cancel.clone()));
    FeedTask {
        cancel,
        handle: Some(handle),
    }
}

async fn pump<S: FeedSink>(mut feed: TopicFeed, sink: Arc<S>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = feed.recv() => match event {
                Some(event) => sink.apply_event(event),
                None => break,
            },
        }
    }
    feed.shutdown();
    sink.close();
    debug!(url = %feed.url(), "feed pump exited");
}

/// A live subscription to one topic.
///
/// Dropping it (or calling [`unsubscribe`](Self::unsubscribe)) closes the
/// push channel and discards the snapshot. A subscription never outlives
/// its engine: engine shutdown cancels it too.
pub struct Subscription<T: TopicRecord> {
    stream: Arc<SnapshotStream<T>>,
    task: FeedTask,
}

impl<T: TopicRecord> Subscription<T> {
    pub(crate) fn spawn(stream: Arc<SnapshotStream<T>>, feed: TopicFeed, cancel: CancellationToken) -> Self {
        let task = spawn_feed(feed, Arc::clone(&stream), cancel);
        Self { stream, task }
    }

    pub fn topic(&self) -> Topic {
        self.stream.topic()
    }

    /// Current snapshot. Empty before the first message and after a drop.
    pub fn current(&self) -> Arc<Snapshot<T>> {
        self.stream.snapshot()
    }

    /// A cloneable read-only view, for handing to other tasks.
    pub fn view(&self) -> SnapshotView<T> {
        SnapshotView::new(self.stream.subscribe(), self.stream.watch_connection_state())
    }

    pub fn connection_state(&self) -> super::ConnectionState {
        self.stream.connection_state()
    }

    /// Close the channel and discard the snapshot.
    pub async fn unsubscribe(mut self) {
        self.stream.close();
        self.task.stop().await;
    }
}

impl<T: TopicRecord> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.task.cancel();
        self.stream.close();
    }
}
