//! `watch`: print each snapshot of one topic as it arrives.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use homectrl_core::{
    ActivityRecord, ConnectionState, ControlState, DeviceState, ElectricityReading, Engine,
    RadioStatus, RecordKind, Snapshot, StateValue, TopicRecord,
};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

// ── Row types ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct DeviceRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Observed")]
    observed: String,
}

#[derive(Tabled)]
struct ElectricityRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Voltage")]
    voltage: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Power")]
    power: String,
    #[tabled(rename = "Energy")]
    energy: String,
    #[tabled(rename = "PF")]
    power_factor: String,
}

#[derive(Tabled)]
struct ActivityRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Active")]
    active: String,
    #[tabled(rename = "Started")]
    started: String,
    #[tabled(rename = "Ended")]
    ended: String,
}

#[derive(Tabled)]
struct RadioRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Playing")]
    playing: String,
    #[tabled(rename = "Station")]
    station: String,
    #[tabled(rename = "Now playing")]
    info: String,
}

#[derive(Tabled)]
struct ControlStateRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Values")]
    values: String,
}

// ── Formatting helpers ───────────────────────────────────────────────

fn with_unit(value: &StateValue, unit: Option<&str>) -> String {
    match (value, unit) {
        (StateValue::Int(_) | StateValue::Float(_), Some(unit)) => format!("{value} {unit}"),
        _ => value.to_string(),
    }
}

fn measure(value: Option<f64>, unit: &str) -> String {
    value.map_or_else(|| "-".into(), |v| format!("{v:.1} {unit}"))
}

fn timestamp(at: Option<&DateTime<Utc>>) -> String {
    at.map_or_else(|| "-".into(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn control_values(state: &ControlState) -> String {
    state
        .values
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(", ")
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(engine: &Engine, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let topic = args.topic;
    match topic.record_kind() {
        RecordKind::Boolean | RecordKind::Decimal => {
            let unit = topic.unit();
            stream_topic::<DeviceState, _>(
                engine,
                &args,
                global,
                |r| DeviceRow {
                    name: r.name.clone(),
                    value: with_unit(&r.value, unit),
                    observed: timestamp(r.observed_at.as_ref()),
                },
                |r| format!("{}\t{}", r.name, r.value),
            )
            .await
        }
        RecordKind::Electricity => {
            stream_topic::<ElectricityReading, _>(
                engine,
                &args,
                global,
                |r| ElectricityRow {
                    name: r.name.clone(),
                    voltage: measure(r.voltage, "V"),
                    current: measure(r.current, "A"),
                    power: measure(r.active_power, "W"),
                    energy: measure(r.active_energy, "Wh"),
                    power_factor: r.power_factor.map_or_else(|| "-".into(), |pf| format!("{pf:.2}")),
                },
                |r| {
                    format!(
                        "{}\t{}",
                        r.name,
                        r.active_power.map_or_else(|| "-".into(), |p| p.to_string())
                    )
                },
            )
            .await
        }
        RecordKind::Activity => {
            stream_topic::<ActivityRecord, _>(
                engine,
                &args,
                global,
                |r| ActivityRow {
                    name: r.name.clone(),
                    active: r.is_active.to_string(),
                    started: timestamp(r.start_at.as_ref()),
                    ended: timestamp(r.end_at.as_ref()),
                },
                |r| format!("{}\t{}", r.name, r.is_active),
            )
            .await
        }
        RecordKind::Radio => {
            stream_topic::<RadioStatus, _>(
                engine,
                &args,
                global,
                |r| RadioRow {
                    name: r.name.clone(),
                    playing: r.live.to_string(),
                    station: r.station_name.clone().unwrap_or_else(|| "-".into()),
                    info: r.playinfo.clone().unwrap_or_else(|| "-".into()),
                },
                |r| format!("{}\t{}", r.name, r.live),
            )
            .await
        }
        RecordKind::ControlState => {
            stream_topic::<ControlState, _>(
                engine,
                &args,
                global,
                |r| ControlStateRow {
                    name: r.name.clone(),
                    values: control_values(r),
                },
                |r| format!("{}\t{}", r.name, control_values(r)),
            )
            .await
        }
    }
}

/// Subscribe, then print every received snapshot until `--count` is
/// reached, the stream ends, or Ctrl-C.
async fn stream_topic<T, R>(
    engine: &Engine,
    args: &WatchArgs,
    global: &GlobalOpts,
    to_row: impl Fn(&T) -> R,
    line_fn: impl Fn(&T) -> String,
) -> Result<(), CliError>
where
    T: TopicRecord + Serialize,
    R: Tabled,
{
    let subscription = engine.subscribe::<T>(args.topic)?;
    let mut view = subscription.view();
    let mut printed = 0usize;

    let mut pending = Some(view.current().clone());
    loop {
        if let Some(snapshot) = pending.take().filter(|s| s.is_received()) {
            let out = render_snapshot(args, global, &snapshot, &to_row, &line_fn);
            output::print_output(&out, global.quiet);
            printed += 1;
            if args.count.is_some_and(|n| printed >= n) {
                break;
            }
        }

        tokio::select! {
            next = view.changed() => match next {
                Some(snapshot) => pending = Some(snapshot),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted");
                break;
            }
        }

        if matches!(view.connection_state(), ConnectionState::Reconnecting { .. }) && !global.quiet {
            eprintln!("connection lost, reconnecting...");
        }
    }

    engine.unsubscribe(subscription).await;
    Ok(())
}

fn render_snapshot<T, R>(
    args: &WatchArgs,
    global: &GlobalOpts,
    snapshot: &Snapshot<T>,
    to_row: &impl Fn(&T) -> R,
    line_fn: &impl Fn(&T) -> String,
) -> String
where
    T: TopicRecord + Serialize,
    R: Tabled,
{
    let records: Vec<&T> = snapshot
        .iter()
        .map(|r| &**r)
        .filter(|r| args.entity.as_deref().is_none_or(|e| r.name() == e))
        .collect();

    let body = output::render_list(&global.output, &records, |r| to_row(*r), |r| line_fn(*r));
    if matches!(global.output, OutputFormat::Table) {
        let mut out = String::new();
        let _ = writeln!(out, "{} (update {})", args.topic, snapshot.version());
        out.push_str(&body);
        out
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn units_apply_to_numbers_only() {
        assert_eq!(with_unit(&StateValue::Float(21.5), Some("°C")), "21.5 °C");
        assert_eq!(with_unit(&StateValue::Bool(true), Some("°C")), "ON");
        assert_eq!(with_unit(&StateValue::Int(3), None), "3");
    }

    #[test]
    fn missing_measurements_show_a_dash() {
        assert_eq!(measure(None, "W"), "-");
        assert_eq!(measure(Some(1.0), "W"), "1.0 W");
        assert_eq!(timestamp(None), "-");
    }
}
