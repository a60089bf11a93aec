// ── Control dispatcher ──
//
// Turns bursty edits into at most one command per settled value. Range
// edits wait out a per-key debounce window; enum selections go out at
// once. Every accepted edit is overlaid immediately.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, sleep_until};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::pending::{OverlayEntry, OverlayState, PendingTable, ViewId};
use crate::command::{CommandEnvelope, CommandSender, ControlCommand};
use crate::error::CoreError;
use crate::model::{ControlKey, ControlState, StateValue};
use crate::registry::CapabilityRegistry;
use crate::stream::Snapshot;

/// What happened to an accepted edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditOutcome {
    /// Enum selection, handed to the command processor right away.
    Dispatched,
    /// Waiting for the debounce window to elapse.
    Debounced { deadline: Instant },
}

/// Optimistic value shown for one control while an edit is in flight.
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub value: StateValue,
    /// `true` while the edit has not been dispatched yet.
    pub pending: bool,
}

impl Overlay {
    fn from_entry(entry: &OverlayEntry) -> Self {
        Self {
            value: entry.value.clone(),
            pending: matches!(entry.state, OverlayState::Pending { .. }),
        }
    }
}

struct DispatcherInner {
    table: Mutex<PendingTable>,
    wake: Notify,
    registry: CapabilityRegistry,
    commands: CommandSender,
    debounce: Duration,
    next_view: AtomicU64,
}

/// Shared handle to the dispatcher (cheap clone).
#[derive(Clone)]
pub struct ControlDispatcher {
    inner: Arc<DispatcherInner>,
}

impl ControlDispatcher {
    pub(crate) fn new(registry: CapabilityRegistry, debounce: Duration, commands: CommandSender) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                table: Mutex::new(PendingTable::default()),
                wake: Notify::new(),
                registry,
                commands,
                debounce,
                next_view: AtomicU64::new(1),
            }),
        }
    }

    /// Open a view. Edits made through it are discarded, undispatched,
    /// when it is dropped.
    pub fn view(&self) -> ControlView {
        let id = ViewId(self.inner.next_view.fetch_add(1, Ordering::Relaxed));
        ControlView {
            dispatcher: self.clone(),
            id,
        }
    }

    pub fn debounce(&self) -> Duration {
        self.inner.debounce
    }

    /// Current optimistic value for a control, if any.
    pub fn overlay(&self, entity: &str, control: &str) -> Option<Overlay> {
        let key = ControlKey::new(entity, control);
        self.lock().get(&key).map(Overlay::from_entry)
    }

    /// Copy of every overlay entry, taken under one lock.
    pub fn overlays(&self) -> HashMap<ControlKey, Overlay> {
        self.lock()
            .iter()
            .map(|(key, entry)| (key.clone(), Overlay::from_entry(entry)))
            .collect()
    }

    /// Number of edits still waiting for their window.
    pub fn pending_count(&self) -> usize {
        self.lock().pending_count()
    }

    fn submit(
        &self,
        view: ViewId,
        entity: &str,
        control: &str,
        value: StateValue,
    ) -> Result<EditOutcome, CoreError> {
        let descriptor =
            self.inner
                .registry
                .descriptor(entity, control)
                .ok_or_else(|| CoreError::UnknownControl {
                    entity: entity.to_owned(),
                    control: control.to_owned(),
                })?;
        descriptor
            .validate(&value)
            .map_err(|message| CoreError::ValidationFailed { message })?;

        let key = ControlKey::new(entity, control);

        if descriptor.constraint.is_enum() {
            let mut table = self.lock();
            self.inner
                .commands
                .send(CommandEnvelope::fire_and_forget(ControlCommand::new(
                    key.clone(),
                    value.clone(),
                )))
                .map_err(|_| CoreError::EngineStopped)?;
            debug!(control = %key, %value, "enum selection dispatched");
            table.mark_sent(key, value);
            drop(table);
            // The entry may have been the earliest pending deadline.
            self.inner.wake.notify_one();
            return Ok(EditOutcome::Dispatched);
        }

        if self.inner.commands.is_closed() {
            return Err(CoreError::EngineStopped);
        }
        let deadline = Instant::now() + self.inner.debounce;
        trace!(control = %key, %value, "edit debounced");
        self.lock().stage(key, value, deadline, view);
        self.inner.wake.notify_one();
        Ok(EditOutcome::Debounced { deadline })
    }

    /// Apply a fresh control-state snapshot to the overlay.
    pub(crate) fn reconcile(&self, snapshot: &Snapshot<ControlState>) {
        let cleared = self.lock().reconcile(snapshot);
        if cleared > 0 {
            trace!(cleared, "overlay entries confirmed");
            self.inner.wake.notify_one();
        }
    }

    fn discard_view(&self, view: ViewId) {
        let discarded = self.lock().discard_view(view);
        if discarded > 0 {
            debug!(discarded, "view closed, pending edits discarded");
            self.inner.wake.notify_one();
        }
    }

    /// Debounce timer: sleeps until the earliest deadline, then hands
    /// every due edit to the command processor in deadline order.
    pub(crate) async fn run_timer(self, cancel: CancellationToken) {
        loop {
            let next = self.lock().next_deadline();
            let sleep = async {
                match next {
                    Some(deadline) => sleep_until(deadline).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                () = self.inner.wake.notified() => continue,
                () = sleep => {}
            }

            let due = self.lock().take_due(Instant::now());
            for (key, value) in due {
                debug!(control = %key, %value, "debounce elapsed, dispatching");
                let envelope = CommandEnvelope::fire_and_forget(ControlCommand::new(key, value));
                if self.inner.commands.send(envelope).is_err() {
                    debug!("command channel closed, timer exiting");
                    return;
                }
            }
        }

        let discarded = self.lock().discard_pending();
        if discarded > 0 {
            debug!(discarded, "shutdown discarded pending edits");
        }
    }

    fn lock(&self) -> MutexGuard<'_, PendingTable> {
        self.inner.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An edit surface (one open control view).
///
/// Dropping the view cancels its pending edits without dispatching them.
/// Edits already sent are unaffected.
pub struct ControlView {
    dispatcher: ControlDispatcher,
    id: ViewId,
}

impl ControlView {
    /// Validate and submit an edit. The new value is visible through
    /// [`ControlDispatcher::overlay`] as soon as this returns.
    pub fn submit_edit(
        &self,
        entity: &str,
        control: &str,
        value: impl Into<StateValue>,
    ) -> Result<EditOutcome, CoreError> {
        self.dispatcher.submit(self.id, entity, control, value.into())
    }

    pub fn id(&self) -> ViewId {
        self.id
    }
}

impl Drop for ControlView {
    fn drop(&mut self) {
        self.dispatcher.discard_view(self.id);
    }
}
