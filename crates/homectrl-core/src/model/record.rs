// ── Per-topic record shapes ──
//
// Every topic delivers `{ result: [ ... ] }`, but what sits inside `result`
// differs per feed. Each shape implements `TopicRecord`; the only thing the
// engine assumes across topics is the `name` join key.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use super::value::StateValue;

/// A record that can live inside a topic snapshot.
pub trait TopicRecord: DeserializeOwned + Send + Sync + 'static {
    /// The entity name: the join key across every stream.
    fn name(&self) -> &str;
}

// ── Boolean / decimal facets ─────────────────────────────────────────

/// Last reported state of one entity on a boolean or decimal facet
/// (live, presence, light, darkness, temperature, humidity, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceState {
    pub name: String,
    pub value: StateValue,
    #[serde(
        rename = "create_at",
        default,
        deserialize_with = "deserialize_timestamp"
    )]
    pub observed_at: Option<DateTime<Utc>>,
    /// Everything else the server attached.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TopicRecord for DeviceState {
    fn name(&self) -> &str {
        &self.name
    }
}

// ── Electricity ──────────────────────────────────────────────────────

/// Power meter reading. Fields are absent or `null` when the meter did
/// not report them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElectricityReading {
    pub name: String,
    #[serde(default)]
    pub voltage: Option<f64>,
    #[serde(default)]
    pub current: Option<f64>,
    #[serde(default)]
    pub active_power: Option<f64>,
    /// Accumulated energy in Wh.
    #[serde(default)]
    pub active_energy: Option<f64>,
    /// 0.0 ..= 1.0
    #[serde(default)]
    pub power_factor: Option<f64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TopicRecord for ElectricityReading {
    fn name(&self) -> &str {
        &self.name
    }
}

// ── Activities ───────────────────────────────────────────────────────

/// A tracked activity, e.g. a laundry cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub name: String,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub start_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub end_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TopicRecord for ActivityRecord {
    fn name(&self) -> &str {
        &self.name
    }
}

// ── Radio ────────────────────────────────────────────────────────────

/// What the radio player is doing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadioStatus {
    pub name: String,
    #[serde(default)]
    pub live: bool,
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub playinfo: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TopicRecord for RadioStatus {
    fn name(&self) -> &str {
        &self.name
    }
}

// ── Control state ────────────────────────────────────────────────────

/// Current control values of one entity: `{name, <control>: value, ...}`.
///
/// Keys that are not scalars (nested objects, `null`) are not control
/// values and are skipped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlState {
    pub name: String,
    #[serde(flatten)]
    pub values: BTreeMap<String, StateValue>,
}

impl ControlState {
    pub fn get(&self, control: &str) -> Option<&StateValue> {
        self.values.get(control)
    }
}

impl<'de> Deserialize<'de> for ControlState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut map = serde_json::Map::<String, serde_json::Value>::deserialize(deserializer)?;
        let name = match map.remove("name") {
            Some(serde_json::Value::String(name)) => name,
            Some(_) => return Err(serde::de::Error::custom("`name` must be a string")),
            None => return Err(serde::de::Error::missing_field("name")),
        };
        let values = map
            .iter()
            .filter_map(|(k, v)| StateValue::from_json(v).map(|sv| (k.clone(), sv)))
            .collect();
        Ok(Self { name, values })
    }
}

impl TopicRecord for ControlState {
    fn name(&self) -> &str {
        &self.name
    }
}

// ── Timestamps ───────────────────────────────────────────────────────

/// Accept RFC 3339 timestamps as well as the server's naive ISO form
/// (`2024-06-15T10:30:00.123456`, read as UTC).
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(dt) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(dt.with_timezone(&Utc)));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S%.f"))
        .map(|naive| Some(naive.and_utc()))
        .map_err(serde::de::Error::custom)
}
