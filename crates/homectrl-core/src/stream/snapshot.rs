// ── Single-writer snapshot store ──
//
// Each inbound message replaces the whole snapshot. Readers receive the
// new `Arc` through a `watch` channel and never see a partial update.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use homectrl_api::FeedEvent;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use super::ConnectionState;
use crate::model::TopicRecord;
use crate::topic::Topic;

/// The complete current set of entity states for one topic.
#[derive(Debug)]
pub struct Snapshot<T> {
    records: Vec<Arc<T>>,
    index: HashMap<String, usize>,
    version: u64,
    received: bool,
}

impl<T: TopicRecord> Snapshot<T> {
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
            index: HashMap::new(),
            version: 0,
            received: false,
        }
    }

    /// Build a snapshot from records in receipt order.
    ///
    /// Duplicate names resolve last-one-wins; the entity keeps the
    /// position of its first occurrence.
    pub fn from_records(records: impl IntoIterator<Item = T>) -> Self {
        let mut snap = Self::empty();
        snap.received = true;
        for record in records {
            let record = Arc::new(record);
            if let Some(&pos) = snap.index.get(record.name()) {
                snap.records[pos] = record;
            } else {
                snap.index.insert(record.name().to_owned(), snap.records.len());
                snap.records.push(record);
            }
        }
        snap
    }

    fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Look up an entity by name. O(1).
    pub fn get(&self, name: &str) -> Option<&Arc<T>> {
        self.index.get(name).and_then(|&pos| self.records.get(pos))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn records(&self) -> &[Arc<T>] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<T>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bumped on every replacement or reset of the owning stream.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// `false` for the empty placeholder installed on subscribe,
    /// (re)connect and drop; `true` once built from a server message.
    pub fn is_received(&self) -> bool {
        self.received
    }
}

/// Outcome of applying one feed event.
#[derive(Debug)]
pub enum Applied<T> {
    /// (Re)connect or drop: the snapshot is now empty.
    Reset,
    /// A new snapshot replaced the previous one.
    Replaced(Arc<Snapshot<T>>),
    /// The message did not decode; the previous snapshot was kept.
    Malformed,
    /// The stream was closed; nothing changed.
    Closed,
}

struct WriterState {
    closed: bool,
    version: u64,
}

/// Latest snapshot of one topic plus its connection state.
///
/// Only the feed pump writes to it (via [`apply`](Self::apply)); any
/// number of readers observe it.
pub struct SnapshotStream<T: TopicRecord> {
    topic: Topic,
    writer: Mutex<WriterState>,
    snapshot: watch::Sender<Arc<Snapshot<T>>>,
    state: watch::Sender<ConnectionState>,
}

impl<T: TopicRecord> SnapshotStream<T> {
    /// A new stream starts with an empty snapshot, so readers never wait
    /// for the first message.
    pub fn new(topic: Topic) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::empty()));
        let (state, _) = watch::channel(ConnectionState::Connecting);
        Self {
            topic,
            writer: Mutex::new(WriterState {
                closed: false,
                version: 0,
            }),
            snapshot,
            state,
        }
    }

    pub fn topic(&self) -> Topic {
        self.topic
    }

    /// Apply one feed event, in receipt order.
    pub fn apply(&self, event: FeedEvent) -> Applied<T> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if writer.closed {
            return Applied::Closed;
        }

        match event {
            FeedEvent::Connected => {
                debug!(topic = %self.topic, "stream connected, snapshot reset");
                self.state.send_replace(ConnectionState::Connected);
                self.reset(&mut writer);
                Applied::Reset
            }
            FeedEvent::Disconnected { attempt } => {
                debug!(topic = %self.topic, attempt, "stream lost, snapshot reset");
                self.state
                    .send_replace(ConnectionState::Reconnecting { attempt });
                self.reset(&mut writer);
                Applied::Reset
            }
            FeedEvent::Snapshot(raw) => match decode::<T>(raw) {
                Ok(records) => {
                    writer.version += 1;
                    let snap =
                        Arc::new(Snapshot::from_records(records).with_version(writer.version));
                    trace!(topic = %self.topic, entities = snap.len(), "snapshot replaced");
                    self.snapshot.send_replace(Arc::clone(&snap));
                    Applied::Replaced(snap)
                }
                Err(e) => {
                    warn!(topic = %self.topic, error = %e, "dropping malformed message");
                    Applied::Malformed
                }
            },
        }
    }

    /// Close the stream and discard its snapshot. Later events are ignored.
    pub fn close(&self) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        if writer.closed {
            return;
        }
        writer.closed = true;
        self.state.send_replace(ConnectionState::Closed);
        self.reset(&mut writer);
        debug!(topic = %self.topic, "stream closed");
    }

    pub fn is_closed(&self) -> bool {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .closed
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<Snapshot<T>> {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot replacements.
    pub fn subscribe(&self) -> watch::Receiver<Arc<Snapshot<T>>> {
        self.snapshot.subscribe()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn reset(&self, writer: &mut WriterState) {
        writer.version += 1;
        self.snapshot
            .send_replace(Arc::new(Snapshot::empty().with_version(writer.version)));
    }
}

/// Decode every record or none.
fn decode<T: TopicRecord>(raw: Vec<serde_json::Value>) -> Result<Vec<T>, serde_json::Error> {
    raw.into_iter().map(serde_json::from_value).collect()
}
