// ── Control plane ──
//
// Optimistic edits, debounce and reconciliation against the control-state
// topic, plus the merged panel view.

mod dispatcher;
mod panel;
mod pending;
mod state;

pub use dispatcher::{ControlDispatcher, ControlView, EditOutcome, Overlay};
pub use panel::{ControlPanel, PanelControl, PanelEntity, ValueSource};
pub use pending::ViewId;
pub use state::ControlStateStream;
