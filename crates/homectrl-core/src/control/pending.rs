// ── Optimistic overlay table ──
//
// One entry per (entity, control). An entry is either a debounced edit
// waiting for its deadline, or an edit already handed to the command
// processor whose confirmation has not arrived yet. Pure state: the
// dispatcher owns the clock and the lock.

use std::collections::HashMap;

use tokio::time::Instant;

use crate::model::{ControlKey, ControlState, StateValue};
use crate::stream::Snapshot;

/// Identifies the control view an edit was made through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewId(pub(crate) u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OverlayState {
    Pending { deadline: Instant, view: ViewId },
    Sent,
}

#[derive(Debug, Clone)]
pub(crate) struct OverlayEntry {
    pub(crate) value: StateValue,
    pub(crate) state: OverlayState,
}

#[derive(Debug, Default)]
pub(crate) struct PendingTable {
    entries: HashMap<ControlKey, OverlayEntry>,
}

impl PendingTable {
    /// Record a debounced edit, replacing whatever the key held.
    pub(crate) fn stage(&mut self, key: ControlKey, value: StateValue, deadline: Instant, view: ViewId) {
        self.entries.insert(
            key,
            OverlayEntry {
                value,
                state: OverlayState::Pending { deadline, view },
            },
        );
    }

    /// Record an edit that was dispatched without debouncing. Supersedes
    /// a pending edit for the same key.
    pub(crate) fn mark_sent(&mut self, key: ControlKey, value: StateValue) {
        self.entries.insert(
            key,
            OverlayEntry {
                value,
                state: OverlayState::Sent,
            },
        );
    }

    /// Move every pending edit whose deadline has passed to `Sent` and
    /// return them in deadline order for dispatch.
    pub(crate) fn take_due(&mut self, now: Instant) -> Vec<(ControlKey, StateValue)> {
        let mut due: Vec<(Instant, ControlKey, StateValue)> = Vec::new();
        for (key, entry) in &mut self.entries {
            if let OverlayState::Pending { deadline, .. } = entry.state {
                if deadline <= now {
                    entry.state = OverlayState::Sent;
                    due.push((deadline, key.clone(), entry.value.clone()));
                }
            }
        }
        due.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        due.into_iter().map(|(_, key, value)| (key, value)).collect()
    }

    /// Earliest deadline among pending edits.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .values()
            .filter_map(|e| match e.state {
                OverlayState::Pending { deadline, .. } => Some(deadline),
                OverlayState::Sent => None,
            })
            .min()
    }

    /// Reconcile against a fresh control-state snapshot.
    ///
    /// A pending edit is cleared (never dispatched) when the snapshot
    /// already reports its value. A sent edit is cleared as soon as the
    /// snapshot reports the pair at all. Pairs absent from the snapshot
    /// are left alone. Returns how many entries were cleared.
    pub(crate) fn reconcile(&mut self, snapshot: &Snapshot<ControlState>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, entry| {
            let Some(reported) = snapshot.get(&key.entity).and_then(|s| s.get(&key.control)) else {
                return true;
            };
            match entry.state {
                OverlayState::Pending { .. } => *reported != entry.value,
                OverlayState::Sent => false,
            }
        });
        before - self.entries.len()
    }

    /// Drop the pending edits made through `view`. Sent edits stay until
    /// confirmed. Returns how many were discarded.
    pub(crate) fn discard_view(&mut self, view: ViewId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| {
            !matches!(entry.state, OverlayState::Pending { view: owner, .. } if owner == view)
        });
        before - self.entries.len()
    }

    /// Drop every pending edit. Returns how many were discarded.
    pub(crate) fn discard_pending(&mut self) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| entry.state == OverlayState::Sent);
        before - self.entries.len()
    }

    pub(crate) fn get(&self, key: &ControlKey) -> Option<&OverlayEntry> {
        self.entries.get(key)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&ControlKey, &OverlayEntry)> {
        self.entries.iter()
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| matches!(e.state, OverlayState::Pending { .. }))
            .count()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::BTreeMap;
    use std::time::Duration;

    use super::*;

    const A: ViewId = ViewId(1);
    const B: ViewId = ViewId(2);

    fn key(entity: &str, control: &str) -> ControlKey {
        ControlKey::new(entity, control)
    }

    fn state(entity: &str, control: &str, value: impl Into<StateValue>) -> Snapshot<ControlState> {
        let mut values = BTreeMap::new();
        values.insert(control.to_owned(), value.into());
        Snapshot::from_records([ControlState {
            name: entity.to_owned(),
            values,
        }])
    }

    #[test]
    fn staging_replaces_and_restarts_deadline() {
        let now = Instant::now();
        let mut table = PendingTable::default();
        table.stage(key("dev", "led"), StateValue::Int(1), now + Duration::from_millis(300), A);
        table.stage(key("dev", "led"), StateValue::Int(2), now + Duration::from_millis(500), A);

        assert_eq!(table.len(), 1);
        assert_eq!(table.next_deadline(), Some(now + Duration::from_millis(500)));
        assert!(table.take_due(now + Duration::from_millis(300)).is_empty());

        let due = table.take_due(now + Duration::from_millis(500));
        assert_eq!(due, vec![(key("dev", "led"), StateValue::Int(2))]);
        assert_eq!(table.pending_count(), 0);
        assert_eq!(table.len(), 1, "sent edit stays as overlay");
        assert_eq!(table.next_deadline(), None);
    }

    #[test]
    fn due_edits_come_out_in_deadline_order() {
        let now = Instant::now();
        let mut table = PendingTable::default();
        table.stage(key("b", "x"), StateValue::Int(2), now + Duration::from_millis(20), A);
        table.stage(key("a", "x"), StateValue::Int(1), now + Duration::from_millis(10), A);

        let due = table.take_due(now + Duration::from_millis(50));
        let keys: Vec<_> = due.into_iter().map(|(k, _)| k.entity).collect();
        assert_eq!(keys, vec!["a", "b"]);
    }

    #[test]
    fn matching_authoritative_value_cancels_pending_edit() {
        let now = Instant::now();
        let mut table = PendingTable::default();
        table.stage(key("dev", "led"), StateValue::Int(5), now, A);

        assert_eq!(table.reconcile(&state("dev", "led", 5_i64)), 1);
        assert!(table.take_due(now).is_empty());
    }

    #[test]
    fn differing_or_absent_value_keeps_pending_edit() {
        let now = Instant::now();
        let mut table = PendingTable::default();
        table.stage(key("dev", "led"), StateValue::Int(5), now, A);

        assert_eq!(table.reconcile(&state("dev", "led", 4_i64)), 0);
        assert_eq!(table.reconcile(&state("dev", "other", 5_i64)), 0);
        assert_eq!(table.reconcile(&state("elsewhere", "led", 5_i64)), 0);
        assert_eq!(table.get(&key("dev", "led")).unwrap().value, StateValue::Int(5));
    }

    #[test]
    fn sent_edit_cleared_by_any_report_of_the_pair() {
        let mut table = PendingTable::default();
        table.mark_sent(key("dev", "light"), StateValue::from("on"));

        assert_eq!(table.reconcile(&state("dev", "mode", "x")), 0);
        assert_eq!(table.reconcile(&state("dev", "light", "off")), 1);
        assert!(table.get(&key("dev", "light")).is_none());
    }

    #[test]
    fn discarding_a_view_leaves_other_views_and_sent_edits() {
        let now = Instant::now();
        let mut table = PendingTable::default();
        table.stage(key("dev", "a"), StateValue::Int(1), now, A);
        table.stage(key("dev", "b"), StateValue::Int(1), now, B);
        table.mark_sent(key("dev", "c"), StateValue::from("on"));

        assert_eq!(table.discard_view(A), 1);
        assert!(table.get(&key("dev", "a")).is_none());
        assert!(table.get(&key("dev", "b")).is_some());
        assert!(table.get(&key("dev", "c")).is_some());

        assert_eq!(table.discard_pending(), 1);
        assert_eq!(table.len(), 1);
    }
}
