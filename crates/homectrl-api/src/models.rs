// Wire models for the REST endpoints.
//
// These mirror the JSON the server emits and accepts. Domain typing
// (descriptors, validated values) happens in `homectrl-core`.

use indexmap::IndexMap;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::debug;

/// Response of `GET /capabilities`: entity name -> its controls.
///
/// Ordered as the server sent it, so panels render in a stable order.
pub type CapabilitiesResponse = IndexMap<String, DeviceCapabilities>;

/// Capability announcement of a single entity.
///
/// `controls` may be absent or `null`; controls that fail to decode are
/// dropped one by one so a broken device cannot hide the others.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    #[serde(default, deserialize_with = "deserialize_controls")]
    pub controls: Vec<RawControl>,
}

fn deserialize_controls<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Vec<RawControl>, D::Error> {
    let raw = Option::<Vec<serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|value| match serde_json::from_value::<RawControl>(value) {
            Ok(control) => Some(control),
            Err(e) => {
                debug!(error = %e, "skipping undecodable control");
                None
            }
        })
        .collect())
}

/// One control as announced by a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawControl {
    pub name: String,
    /// Declared value type: `"str"`, `"int"`, `"float"` or `"bool"`.
    #[serde(rename = "type")]
    pub value_type: String,
    pub constraints: RawConstraints,
}

/// Constraint block, tagged by its `type` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RawConstraints {
    Enum { values: Vec<serde_json::Value> },
    Range { values: RawRange },
    /// Constraint kinds this client does not understand.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RawRange {
    pub min: f64,
    pub max: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
}

/// Body of `POST /control`: `{"name": <entity>, <control>: <value>}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlRequest {
    pub name: String,
    pub control: String,
    pub value: serde_json::Value,
}

impl Serialize for ControlRequest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry("name", &self.name)?;
        map.serialize_entry(&self.control, &self.value)?;
        map.end()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn control_request_flattens_control_name() {
        let req = ControlRequest {
            name: "kitchen".into(),
            control: "light".into(),
            value: json!("auto"),
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({"name": "kitchen", "light": "auto"})
        );
    }

    #[test]
    fn capabilities_keep_server_order() {
        let raw = json!({
            "wardrobe": {"controls": []},
            "dev": {"controls": [
                {"name": "light", "type": "str",
                 "constraints": {"type": "enum", "values": ["on", "off", "auto"]}},
                {"name": "led_modulo", "type": "int",
                 "constraints": {"type": "range", "values": {"min": 1, "max": 3600}}}
            ]}
        });
        let caps: CapabilitiesResponse = serde_json::from_value(raw).unwrap();
        let names: Vec<&str> = caps.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["wardrobe", "dev"]);

        let dev = &caps["dev"];
        assert_eq!(dev.controls.len(), 2);
        assert_eq!(
            dev.controls[1].constraints,
            RawConstraints::Range {
                values: RawRange {
                    min: 1.0,
                    max: 3600.0,
                    step: None
                }
            }
        );
    }

    #[test]
    fn broken_entity_does_not_hide_the_others() {
        let raw = json!({
            "sensor": {"controls": null},
            "plug": {"controls": [
                {"name": "mode", "type": "int",
                 "constraints": {"type": "range", "values": {"min": 1}}},
                {"name": "power", "type": "bool",
                 "constraints": {"type": "enum", "values": [true, false]}}
            ]},
            "dev": {"controls": [
                {"name": "light", "type": "str",
                 "constraints": {"type": "enum", "values": ["on", "off", "auto"]}}
            ]}
        });
        let caps: CapabilitiesResponse = serde_json::from_value(raw).unwrap();

        assert!(caps["sensor"].controls.is_empty());
        let plug: Vec<&str> = caps["plug"].controls.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(plug, vec!["power"]);
        assert_eq!(caps["dev"].controls[0].name, "light");
    }

    #[test]
    fn unknown_constraint_kind_is_tolerated() {
        let raw = json!({"name": "color", "type": "str", "constraints": {"type": "palette", "values": []}});
        let control: RawControl = serde_json::from_value(raw).unwrap();
        assert_eq!(control.constraints, RawConstraints::Unknown);
    }
}
