// ── Control panel merge ──
//
// Joins the capability registry, the liveness index and the control state
// (with its overlay) into the rows a control surface renders.

use serde::Serialize;
use strum::Display;

use super::dispatcher::Overlay;
use super::state::ControlStateStream;
use crate::liveness::{LivenessIndex, is_alive_in};
use crate::model::{ControlDescriptor, ControlKey, ControlState, DeviceState, StateValue};
use crate::registry::Capabilities;
use crate::stream::Snapshot;

/// Where a displayed value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValueSource {
    /// Local edit not yet dispatched.
    Pending,
    /// Local edit dispatched, awaiting confirmation.
    Sent,
    Authoritative,
    /// Range control with no reported value: shows its minimum.
    Default,
    /// Enum control with no reported value: nothing selected.
    Unset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelControl {
    pub descriptor: ControlDescriptor,
    pub value: Option<StateValue>,
    pub source: ValueSource,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PanelEntity {
    pub name: String,
    pub controls: Vec<PanelControl>,
}

/// Every alive entity that has at least one control, in registry order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControlPanel {
    pub entities: Vec<PanelEntity>,
}

impl ControlPanel {
    pub fn build(
        capabilities: &Capabilities,
        liveness: &LivenessIndex,
        control_state: &ControlStateStream,
    ) -> Self {
        // Overlays are copied before the state snapshot is read. A reconcile
        // in between can leave an overlay showing, never a stale report.
        let overlays = control_state.dispatcher().overlays();
        let state = control_state.snapshot();
        Self::merge(capabilities, &liveness.snapshot(), &state, |entity, control| {
            overlays.get(&ControlKey::new(entity, control)).cloned()
        })
    }

    /// Merge from fixed inputs: nothing read here changes mid-merge.
    pub(crate) fn merge(
        capabilities: &Capabilities,
        liveness: &Snapshot<DeviceState>,
        state: &Snapshot<ControlState>,
        overlay: impl Fn(&str, &str) -> Option<Overlay>,
    ) -> Self {
        let entities = capabilities
            .iter()
            .filter(|(name, controls)| !controls.is_empty() && is_alive_in(liveness, name))
            .map(|(name, controls)| {
                let reported = state.get(name);
                let controls = controls
                    .iter()
                    .map(|descriptor| {
                        let (value, source) = if let Some(o) = overlay(name, &descriptor.name) {
                            let source = if o.pending {
                                ValueSource::Pending
                            } else {
                                ValueSource::Sent
                            };
                            (Some(o.value), source)
                        } else if let Some(v) = reported.and_then(|r| r.get(&descriptor.name)) {
                            (Some(v.clone()), ValueSource::Authoritative)
                        } else {
                            match descriptor.default_value() {
                                Some(v) => (Some(v), ValueSource::Default),
                                None => (None, ValueSource::Unset),
                            }
                        };
                        PanelControl {
                            descriptor: descriptor.clone(),
                            value,
                            source,
                        }
                    })
                    .collect();
                PanelEntity {
                    name: name.to_owned(),
                    controls,
                }
            })
            .collect();
        Self { entities }
    }

    pub fn entity(&self, name: &str) -> Option<&PanelEntity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use homectrl_api::CapabilitiesResponse;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn capabilities() -> Capabilities {
        let raw: CapabilitiesResponse = serde_json::from_value(json!({
            "dev": {"controls": [
                {"name": "light", "type": "str",
                 "constraints": {"type": "enum", "values": ["on", "off", "auto"]}},
                {"name": "led_modulo", "type": "int",
                 "constraints": {"type": "range", "values": {"min": 1, "max": 3600}}}
            ]},
            "wardrobe": {"controls": []},
            "sleeping": {"controls": [
                {"name": "light", "type": "str",
                 "constraints": {"type": "enum", "values": ["on", "off"]}}
            ]}
        }))
        .unwrap();
        Capabilities::from_raw(&raw)
    }

    fn decode<T: crate::model::TopicRecord>(records: serde_json::Value) -> Snapshot<T> {
        let records: Vec<T> = serde_json::from_value(records).unwrap();
        Snapshot::from_records(records)
    }

    fn sources(panel: &ControlPanel, entity: &str) -> Vec<(String, Option<StateValue>, ValueSource)> {
        panel
            .entity(entity)
            .unwrap()
            .controls
            .iter()
            .map(|c| (c.descriptor.name.clone(), c.value.clone(), c.source))
            .collect()
    }

    #[test]
    fn only_alive_entities_with_controls() {
        let live = decode(json!([
            {"name": "dev", "value": true},
            {"name": "wardrobe", "value": true},
            {"name": "sleeping", "value": false}
        ]));
        let panel = ControlPanel::merge(&capabilities(), &live, &Snapshot::empty(), |_, _| None);

        let names: Vec<_> = panel.entities.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["dev"]);
    }

    #[test]
    fn defaults_before_any_state() {
        let live = decode(json!([{"name": "dev", "value": true}]));
        let panel = ControlPanel::merge(&capabilities(), &live, &Snapshot::empty(), |_, _| None);

        assert_eq!(
            sources(&panel, "dev"),
            vec![
                ("light".into(), None, ValueSource::Unset),
                ("led_modulo".into(), Some(StateValue::Int(1)), ValueSource::Default),
            ]
        );
    }

    #[test]
    fn overlay_beats_authoritative() {
        let live = decode(json!([{"name": "dev", "value": true}]));
        let state = decode(json!([{"name": "dev", "light": "off", "led_modulo": 60}]));
        let panel = ControlPanel::merge(&capabilities(), &live, &state, |_, control| {
            (control == "led_modulo").then(|| Overlay {
                value: StateValue::Int(120),
                pending: true,
            })
        });

        assert_eq!(
            sources(&panel, "dev"),
            vec![
                ("light".into(), Some(StateValue::from("off")), ValueSource::Authoritative),
                ("led_modulo".into(), Some(StateValue::Int(120)), ValueSource::Pending),
            ]
        );
    }
}
