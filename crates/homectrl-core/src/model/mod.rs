// ── Domain model ──
//
// Canonical types shared by every stream, the registry and the dispatcher.

pub mod capability;
pub mod record;
pub mod value;

pub use capability::{Constraint, ControlDescriptor, Range, ValueType};
pub use record::{ActivityRecord, ControlState, DeviceState, ElectricityReading, RadioStatus, TopicRecord};
pub use value::StateValue;

/// Identifies one control of one entity: the dispatcher's debounce key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlKey {
    pub entity: String,
    pub control: String,
}

impl ControlKey {
    pub fn new(entity: impl Into<String>, control: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            control: control.into(),
        }
    }
}

impl std::fmt::Display for ControlKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.entity, self.control)
    }
}
