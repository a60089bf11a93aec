// ── Control schema ──
//
// Typed view of the capability announcement: what each entity lets an
// operator change, and within which bounds.

use std::fmt;

use homectrl_api::{RawConstraints, RawControl};
use serde::Serialize;
use strum::{Display, EnumString};

use super::value::StateValue;

/// Declared type of a control's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Str,
    Int,
    Float,
    Bool,
}

impl ValueType {
    /// Whether `value` is of this type. Integers are acceptable floats.
    pub fn accepts(self, value: &StateValue) -> bool {
        matches!(
            (self, value),
            (Self::Str, StateValue::Text(_))
                | (Self::Int, StateValue::Int(_))
                | (Self::Float, StateValue::Int(_) | StateValue::Float(_))
                | (Self::Bool, StateValue::Bool(_))
        )
    }

    /// Parse operator input (e.g. a CLI argument) as this type.
    pub fn parse(self, input: &str) -> Result<StateValue, String> {
        match self {
            Self::Str => Ok(StateValue::Text(input.to_owned())),
            Self::Int => input
                .trim()
                .parse::<i64>()
                .map(StateValue::Int)
                .map_err(|e| format!("'{input}' is not an integer: {e}")),
            Self::Float => input
                .trim()
                .parse::<f64>()
                .map(StateValue::Float)
                .map_err(|e| format!("'{input}' is not a number: {e}")),
            Self::Bool => match input.trim().to_ascii_lowercase().as_str() {
                "true" | "on" | "1" => Ok(StateValue::Bool(true)),
                "false" | "off" | "0" => Ok(StateValue::Bool(false)),
                _ => Err(format!("'{input}' is not a boolean")),
            },
        }
    }
}

/// Range bounds. `step` defaults to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// What values a control admits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Constraint {
    /// A discrete choice set, in announcement order, without duplicates.
    Enum { values: Vec<StateValue> },
    Range(Range),
}

impl Constraint {
    pub fn is_enum(&self) -> bool {
        matches!(self, Self::Enum { .. })
    }
}

/// One control of one entity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlDescriptor {
    pub name: String,
    pub value_type: ValueType,
    pub constraint: Constraint,
}

impl ControlDescriptor {
    /// Build from the wire form. Returns `None` for controls with an
    /// unknown type or constraint kind; those are not rendered.
    pub fn from_raw(raw: &RawControl) -> Option<Self> {
        let value_type = raw.value_type.parse::<ValueType>().ok()?;
        let constraint = match &raw.constraints {
            RawConstraints::Enum { values } => {
                let mut allowed: Vec<StateValue> = Vec::with_capacity(values.len());
                for v in values.iter().filter_map(StateValue::from_json) {
                    if !allowed.contains(&v) {
                        allowed.push(v);
                    }
                }
                Constraint::Enum { values: allowed }
            }
            RawConstraints::Range { values } => Constraint::Range(Range {
                min: values.min,
                max: values.max,
                step: values.step.unwrap_or(1.0),
            }),
            RawConstraints::Unknown => return None,
        };
        Some(Self {
            name: raw.name.clone(),
            value_type,
            constraint,
        })
    }

    /// Check a proposed value against type and constraint.
    pub fn validate(&self, value: &StateValue) -> Result<(), String> {
        if !self.value_type.accepts(value) {
            return Err(format!(
                "control '{}' expects a {} value, got '{value}'",
                self.name, self.value_type
            ));
        }
        match &self.constraint {
            Constraint::Enum { values } => {
                if values.contains(value) {
                    Ok(())
                } else {
                    Err(format!(
                        "'{value}' is not one of [{}] for control '{}'",
                        JoinDisplay(values),
                        self.name
                    ))
                }
            }
            Constraint::Range(range) => {
                let n = value.as_f64().unwrap_or(f64::NAN);
                if n >= range.min && n <= range.max {
                    Ok(())
                } else {
                    Err(format!(
                        "{value} is outside {}..={} for control '{}'",
                        range.min, range.max, self.name
                    ))
                }
            }
        }
    }

    /// Value shown when no authoritative value has arrived yet.
    pub fn default_value(&self) -> Option<StateValue> {
        match &self.constraint {
            Constraint::Enum { .. } => None,
            Constraint::Range(range) => Some(numeric(self.value_type, range.min)),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
fn numeric(value_type: ValueType, n: f64) -> StateValue {
    if value_type == ValueType::Int && n.fract() == 0.0 {
        StateValue::Int(n as i64)
    } else {
        StateValue::Float(n)
    }
}

struct JoinDisplay<'a>(&'a [StateValue]);

impl fmt::Display for JoinDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{v}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(value: serde_json::Value) -> RawControl {
        serde_json::from_value(value).unwrap()
    }

    fn light() -> ControlDescriptor {
        ControlDescriptor::from_raw(&raw(json!({
            "name": "light", "type": "str",
            "constraints": {"type": "enum", "values": ["on", "off", "auto", "on"]}
        })))
        .unwrap()
    }

    fn led_modulo() -> ControlDescriptor {
        ControlDescriptor::from_raw(&raw(json!({
            "name": "led_modulo", "type": "int",
            "constraints": {"type": "range", "values": {"min": 1, "max": 3600}}
        })))
        .unwrap()
    }

    #[test]
    fn enum_values_are_deduplicated_in_order() {
        let Constraint::Enum { values } = light().constraint else {
            panic!("expected enum");
        };
        assert_eq!(
            values,
            vec![StateValue::from("on"), StateValue::from("off"), StateValue::from("auto")]
        );
    }

    #[test]
    fn range_step_defaults_to_one() {
        let Constraint::Range(range) = led_modulo().constraint else {
            panic!("expected range");
        };
        assert!((range.step - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn validate_enum_membership() {
        let d = light();
        assert!(d.validate(&StateValue::from("auto")).is_ok());
        assert!(d.validate(&StateValue::from("dim")).is_err());
        assert!(d.validate(&StateValue::Int(1)).is_err());
    }

    #[test]
    fn validate_range_bounds() {
        let d = led_modulo();
        assert!(d.validate(&StateValue::Int(1)).is_ok());
        assert!(d.validate(&StateValue::Int(3600)).is_ok());
        assert!(d.validate(&StateValue::Int(0)).is_err());
        assert!(d.validate(&StateValue::Int(3601)).is_err());
        assert!(d.validate(&StateValue::Float(2.5)).is_err(), "int control rejects floats");
    }

    #[test]
    fn range_default_is_min() {
        assert_eq!(led_modulo().default_value(), Some(StateValue::Int(1)));
        assert_eq!(light().default_value(), None);
    }

    #[test]
    fn unknown_kinds_are_skipped() {
        assert!(
            ControlDescriptor::from_raw(&raw(json!({
                "name": "rgb", "type": "tuple",
                "constraints": {"type": "enum", "values": []}
            })))
            .is_none()
        );
        assert!(
            ControlDescriptor::from_raw(&raw(json!({
                "name": "rgb", "type": "str",
                "constraints": {"type": "palette"}
            })))
            .is_none()
        );
    }

    #[test]
    fn parse_operator_input() {
        assert_eq!(ValueType::Int.parse("42").unwrap(), StateValue::Int(42));
        assert_eq!(ValueType::Bool.parse("on").unwrap(), StateValue::Bool(true));
        assert!(ValueType::Int.parse("forty").is_err());
    }
}
