//! `capabilities`: the control schema as the server reports it.

use serde::Serialize;
use tabled::Tabled;

use homectrl_core::{Constraint, ControlDescriptor, Engine};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct CapabilityEntry {
    entity: String,
    #[serde(flatten)]
    control: ControlDescriptor,
}

#[derive(Tabled)]
struct CapabilityRow {
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Control")]
    control: String,
    #[tabled(rename = "Type")]
    value_type: String,
    #[tabled(rename = "Allowed")]
    allowed: String,
}

impl From<&CapabilityEntry> for CapabilityRow {
    fn from(e: &CapabilityEntry) -> Self {
        Self {
            entity: e.entity.clone(),
            control: e.control.name.clone(),
            value_type: e.control.value_type.to_string(),
            allowed: describe_constraint(&e.control.constraint),
        }
    }
}

/// "on | off | auto" or "1..=3600 step 1".
pub fn describe_constraint(constraint: &Constraint) -> String {
    match constraint {
        Constraint::Enum { values } => values
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" | "),
        Constraint::Range(r) => format!("{}..={} step {}", r.min, r.max, r.step),
    }
}

pub async fn handle(engine: &Engine, global: &GlobalOpts) -> Result<(), CliError> {
    let caps = engine.load_capabilities().await;

    let entries: Vec<CapabilityEntry> = caps
        .iter()
        .flat_map(|(entity, controls)| {
            controls.iter().map(move |c| CapabilityEntry {
                entity: entity.to_owned(),
                control: c.clone(),
            })
        })
        .collect();

    if entries.is_empty() && !global.quiet {
        eprintln!("No controls reported by the server");
        return Ok(());
    }

    let out = output::render_list(&global.output, &entries, |e: &CapabilityEntry| CapabilityRow::from(e), |e| {
        format!("{}.{}", e.entity, e.control.name)
    });
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
mod tests {
    use homectrl_core::{Range, StateValue};

    use super::*;

    #[test]
    fn constraints_read_naturally() {
        let e = Constraint::Enum {
            values: vec![StateValue::from("on"), StateValue::from("off")],
        };
        assert_eq!(describe_constraint(&e), "on | off");

        let r = Constraint::Range(Range {
            min: 1.0,
            max: 3600.0,
            step: 1.0,
        });
        assert_eq!(describe_constraint(&r), "1..=3600 step 1");
    }
}
