// homectrl-core: real-time state sync and control dispatch between
// homectrl-api and consumers (CLI, dashboards).

pub mod command;
pub mod config;
pub mod control;
pub mod engine;
pub mod error;
pub mod liveness;
pub mod model;
pub mod registry;
pub mod stream;
pub mod topic;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::ControlCommand;
pub use config::{DEFAULT_API_PREFIX, DEFAULT_DEBOUNCE, EngineConfig, TlsVerification};
pub use control::{
    ControlDispatcher, ControlPanel, ControlStateStream, ControlView, EditOutcome, Overlay,
    PanelControl, PanelEntity, ValueSource, ViewId,
};
pub use engine::{Engine, EngineState};
pub use error::CoreError;
pub use liveness::LivenessIndex;
pub use registry::{Capabilities, CapabilityRegistry};
pub use stream::{ConnectionState, Snapshot, SnapshotStream, SnapshotView, Subscription};
pub use topic::{RecordKind, Topic};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    ActivityRecord, Constraint, ControlDescriptor, ControlKey, ControlState, DeviceState,
    ElectricityReading, RadioStatus, Range, StateValue, TopicRecord, ValueType,
};

// Transport types consumers configure directly.
pub use homectrl_api::ReconnectConfig;
