//! `set`: validate and send one control command.

use homectrl_core::Engine;

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;

pub async fn handle(engine: &Engine, args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    engine.start().await?;

    let descriptor = engine
        .registry()
        .descriptor(&args.entity, &args.control)
        .ok_or_else(|| CliError::UnknownControl {
            entity: args.entity.clone(),
            control: args.control.clone(),
        })?;

    let value = descriptor
        .value_type
        .parse(&args.value)
        .map_err(|reason| CliError::Validation {
            field: format!("{}.{}", args.entity, args.control),
            reason,
        })?;

    engine.execute(&args.entity, &args.control, value.clone()).await?;

    if !global.quiet {
        eprintln!("{}.{} set to {value}", args.entity, args.control);
    }
    Ok(())
}
