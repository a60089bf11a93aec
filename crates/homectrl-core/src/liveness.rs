// ── Liveness index ──
//
// Derived view over the liveness topic's snapshot. An entity is alive iff
// the current snapshot holds a truthy value under its name.

use std::sync::Arc;

use crate::model::DeviceState;
use crate::stream::{Snapshot, SnapshotView};

/// Read-only "is this entity currently reporting?" lookup.
#[derive(Clone)]
pub struct LivenessIndex {
    view: SnapshotView<DeviceState>,
}

impl LivenessIndex {
    pub(crate) fn new(view: SnapshotView<DeviceState>) -> Self {
        Self { view }
    }

    /// `false` for names that are absent, including every name before the
    /// first message and after a connection drop.
    pub fn is_alive(&self, name: &str) -> bool {
        is_alive_in(&self.view.latest(), name)
    }

    /// Names of all entities currently alive, in snapshot order.
    pub fn alive(&self) -> Vec<String> {
        self.view
            .latest()
            .iter()
            .filter(|s| s.value.is_truthy())
            .map(|s| s.name.clone())
            .collect()
    }

    /// The snapshot lookups are answered from.
    pub fn snapshot(&self) -> Arc<Snapshot<DeviceState>> {
        self.view.latest()
    }

    /// Wait until the liveness snapshot is replaced.
    pub async fn changed(&mut self) -> bool {
        self.view.changed().await.is_some()
    }
}

pub(crate) fn is_alive_in(snapshot: &Snapshot<DeviceState>, name: &str) -> bool {
    snapshot.get(name).is_some_and(|s| s.value.is_truthy())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homectrl_api::FeedEvent;
    use serde_json::json;

    use super::*;
    use crate::stream::SnapshotStream;
    use crate::topic::Topic;

    fn index() -> (SnapshotStream<DeviceState>, LivenessIndex) {
        let stream = SnapshotStream::new(Topic::Live);
        let view = SnapshotView::new(stream.subscribe(), stream.watch_connection_state());
        (stream, LivenessIndex::new(view))
    }

    fn push(stream: &SnapshotStream<DeviceState>, records: serde_json::Value) {
        let serde_json::Value::Array(items) = records else {
            panic!("array expected");
        };
        stream.apply(FeedEvent::Snapshot(items));
    }

    #[test]
    fn absent_names_are_not_alive() {
        let (stream, live) = index();
        assert!(!live.is_alive("dev"));

        push(&stream, json!([{"name": "dev", "value": true}]));
        assert!(live.is_alive("dev"));
        assert!(!live.is_alive("other"));
    }

    #[test]
    fn falsy_values_are_not_alive() {
        let (stream, live) = index();
        push(
            &stream,
            json!([
                {"name": "a", "value": false},
                {"name": "b", "value": 0},
                {"name": "c", "value": ""},
                {"name": "d", "value": 1},
                {"name": "e", "value": "yes"}
            ]),
        );
        assert!(!live.is_alive("a"));
        assert!(!live.is_alive("b"));
        assert!(!live.is_alive("c"));
        assert!(live.is_alive("d"));
        assert_eq!(live.alive(), vec!["d", "e"]);
    }

    #[test]
    fn drop_clears_liveness() {
        let (stream, live) = index();
        push(&stream, json!([{"name": "dev", "value": true}]));
        stream.apply(FeedEvent::Disconnected { attempt: 0 });
        assert!(!live.is_alive("dev"));
    }
}
