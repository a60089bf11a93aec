// ── Push topics ──
//
// One push channel per facet. The topic name is the last path segment of
// the channel URL (`{prefix}/ws/{topic}`).

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

/// A named category of telemetry with its own push channel.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Topic {
    /// Generic live-device feed: one boolean per entity, `true` while it reports.
    Live,
    Presence,
    Light,
    Darkness,
    Temperature,
    Humidity,
    Pressure,
    Voltage,
    Moisture,
    Electricity,
    Doors,
    Bell,
    Activity,
    Radio,
    /// Current control values per entity.
    State,
}

/// The record shape a topic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Boolean,
    Decimal,
    Electricity,
    Activity,
    Radio,
    ControlState,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    pub fn record_kind(self) -> RecordKind {
        match self {
            Self::Live
            | Self::Presence
            | Self::Light
            | Self::Darkness
            | Self::Doors
            | Self::Bell => RecordKind::Boolean,
            Self::Temperature | Self::Humidity | Self::Pressure | Self::Voltage | Self::Moisture => {
                RecordKind::Decimal
            }
            Self::Electricity => RecordKind::Electricity,
            Self::Activity => RecordKind::Activity,
            Self::Radio => RecordKind::Radio,
            Self::State => RecordKind::ControlState,
        }
    }

    /// Display unit for decimal facets.
    pub fn unit(self) -> Option<&'static str> {
        match self {
            Self::Temperature => Some("°C"),
            Self::Humidity | Self::Moisture => Some("%"),
            Self::Pressure => Some("hPa"),
            Self::Voltage => Some("V"),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn names_round_trip() {
        for topic in Topic::iter() {
            assert_eq!(topic.as_str().parse::<Topic>().unwrap(), topic);
            assert_eq!(topic.to_string(), topic.as_str());
        }
    }

    #[test]
    fn kinds() {
        assert_eq!(Topic::Live.record_kind(), RecordKind::Boolean);
        assert_eq!(Topic::Humidity.record_kind(), RecordKind::Decimal);
        assert_eq!(Topic::State.record_kind(), RecordKind::ControlState);
        assert_eq!(Topic::Pressure.unit(), Some("hPa"));
    }
}
