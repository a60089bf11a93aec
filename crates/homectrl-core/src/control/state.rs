// ── Control state stream ──
//
// The control-state topic's snapshot stream, with every replacement
// reconciled against the dispatcher's overlay.

use std::sync::Arc;

use homectrl_api::FeedEvent;

use super::dispatcher::ControlDispatcher;
use crate::model::{ControlState, StateValue};
use crate::stream::{Applied, ConnectionState, FeedSink, Snapshot, SnapshotStream, SnapshotView};
use crate::topic::Topic;

pub struct ControlStateStream {
    stream: SnapshotStream<ControlState>,
    dispatcher: ControlDispatcher,
}

impl ControlStateStream {
    pub(crate) fn new(dispatcher: ControlDispatcher) -> Self {
        Self {
            stream: SnapshotStream::new(Topic::State),
            dispatcher,
        }
    }

    /// Apply a feed event, reconciling the overlay on replacement.
    pub fn apply(&self, event: FeedEvent) -> Applied<ControlState> {
        let applied = self.stream.apply(event);
        if let Applied::Replaced(snapshot) = &applied {
            self.dispatcher.reconcile(snapshot);
        }
        applied
    }

    /// Last value the server reported for a control.
    pub fn authoritative(&self, entity: &str, control: &str) -> Option<StateValue> {
        self.stream
            .snapshot()
            .get(entity)
            .and_then(|s| s.get(control).cloned())
    }

    /// Value to display: the optimistic overlay if one exists, else the
    /// authoritative value.
    pub fn display_value(&self, entity: &str, control: &str) -> Option<StateValue> {
        self.dispatcher
            .overlay(entity, control)
            .map(|o| o.value)
            .or_else(|| self.authoritative(entity, control))
    }

    pub fn snapshot(&self) -> Arc<Snapshot<ControlState>> {
        self.stream.snapshot()
    }

    pub fn view(&self) -> SnapshotView<ControlState> {
        SnapshotView::new(self.stream.subscribe(), self.stream.watch_connection_state())
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.stream.connection_state()
    }

    pub fn dispatcher(&self) -> &ControlDispatcher {
        &self.dispatcher
    }
}

impl FeedSink for ControlStateStream {
    fn apply_event(&self, event: FeedEvent) {
        self.apply(event);
    }

    fn close(&self) {
        self.stream.close();
    }
}
