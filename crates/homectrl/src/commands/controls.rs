//! `controls`: the control panel of every live device.

use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;
use tracing::debug;

use homectrl_core::{ControlPanel, Engine, PanelControl, StateValue};

use crate::cli::{ControlsArgs, GlobalOpts};
use crate::commands::capabilities::describe_constraint;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct ControlEntry<'a> {
    entity: &'a str,
    #[serde(flatten)]
    control: &'a PanelControl,
}

#[derive(Tabled)]
struct ControlRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Control")]
    control: String,
    #[tabled(rename = "Value")]
    value: String,
    #[tabled(rename = "Source")]
    source: String,
    #[tabled(rename = "Allowed")]
    allowed: String,
}

fn display_value(value: Option<&StateValue>, color: bool) -> String {
    value.map_or_else(|| "-".into(), |v| output::paint_value(v, color))
}

pub async fn handle(
    engine: &Engine,
    args: ControlsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    engine.start().await?;

    let mut liveness = engine.liveness_view();
    let mut state = engine.control_state().view();
    let wait = tokio::time::sleep(Duration::from_secs(args.wait_secs));
    tokio::pin!(wait);

    // Both feeds deliver a full snapshot on connect; wait for the first of each.
    while !(liveness.latest().is_received() && state.latest().is_received()) {
        tokio::select! {
            () = &mut wait => {
                debug!("gave up waiting for initial snapshots");
                break;
            }
            next = liveness.changed() => if next.is_none() { break },
            next = state.changed() => if next.is_none() { break },
        }
    }

    let panel = engine.control_panel();
    render(&panel, &args, global);
    Ok(())
}

fn render(panel: &ControlPanel, args: &ControlsArgs, global: &GlobalOpts) {
    let entries: Vec<ControlEntry<'_>> = panel
        .entities
        .iter()
        .filter(|e| args.entity.as_deref().is_none_or(|name| e.name == name))
        .flat_map(|e| {
            e.controls.iter().map(move |c| ControlEntry {
                entity: &e.name,
                control: c,
            })
        })
        .collect();

    if entries.is_empty() {
        if !global.quiet {
            eprintln!("No live devices with controls");
        }
        return;
    }

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &entries,
        |e| ControlRow {
            entity: e.entity.to_owned(),
            control: e.control.descriptor.name.clone(),
            value: display_value(e.control.value.as_ref(), color),
            source: output::paint_source(e.control.source, color),
            allowed: describe_constraint(&e.control.descriptor.constraint),
        },
        |e| {
            format!(
                "{}.{}\t{}",
                e.entity,
                e.control.descriptor.name,
                display_value(e.control.value.as_ref(), false)
            )
        },
    );
    output::print_output(&out, global.quiet);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_values_show_a_dash() {
        assert_eq!(display_value(None, false), "-");
        assert_eq!(display_value(Some(&StateValue::Int(4)), false), "4");
    }
}
