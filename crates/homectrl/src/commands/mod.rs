//! Command dispatch: bridges CLI args -> engine operations -> output formatting.

pub mod capabilities;
pub mod config_cmd;
pub mod controls;
pub mod set;
pub mod watch;

use homectrl_core::Engine;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, engine: &Engine, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(engine, args, global).await,
        Command::Capabilities => capabilities::handle(engine, global).await,
        Command::Controls(args) => controls::handle(engine, args, global).await,
        Command::Set(args) => set::handle(engine, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    }
}
