//! Clap derive structures for the `homectrl` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};
use homectrl_core::Topic;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// homectrl -- watch and control a HomeCtrl home-automation server
#[derive(Debug, Parser)]
#[command(
    name = "homectrl",
    version,
    about = "Watch live home telemetry and control devices from the command line",
    long_about = "A CLI for HomeCtrl servers.\n\n\
        Streams live topic snapshots over WebSocket, lists device control\n\
        capabilities, renders the control panel of live devices, and sends\n\
        validated control commands.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Server profile to use
    #[arg(long, short = 'p', env = "HOMECTRL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Server URL (overrides profile)
    #[arg(long, short = 'c', env = "HOMECTRL_CONTROLLER", global = true)]
    pub controller: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "HOMECTRL_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates on REST requests
    ///
    /// Push feeds (wss://) always verify against the built-in web PKI
    /// roots; a self-signed server needs plain ws:// for live data.
    #[arg(long, short = 'k', env = "HOMECTRL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "HOMECTRL_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live snapshots of one topic
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// List the control schema reported by the server
    #[command(alias = "caps")]
    Capabilities,

    /// Show the controls of every live device with their current values
    #[command(alias = "ctl")]
    Controls(ControlsArgs),

    /// Send one control command
    Set(SetArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Topic to stream (live, presence, light, temperature, electricity, ...)
    #[arg(value_parser = parse_topic)]
    pub topic: Topic,

    /// Exit after this many snapshots
    #[arg(long, short = 'n')]
    pub count: Option<usize>,

    /// Only show this entity
    #[arg(long, short = 'e')]
    pub entity: Option<String>,
}

fn parse_topic(s: &str) -> Result<Topic, String> {
    s.parse::<Topic>().map_err(|_| {
        let known: Vec<&str> = <Topic as strum::IntoEnumIterator>::iter()
            .map(Topic::as_str)
            .collect();
        format!("unknown topic '{s}' (expected one of: {})", known.join(", "))
    })
}

// ── Controls / Set ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ControlsArgs {
    /// Seconds to wait for the first liveness and state snapshots
    #[arg(long, default_value = "3")]
    pub wait_secs: u64,

    /// Only show this entity
    #[arg(long, short = 'e')]
    pub entity: Option<String>,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Entity (device) name
    pub entity: String,

    /// Control name
    pub control: String,

    /// New value, parsed according to the control's type
    pub value: String,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Display current resolved configuration
    Show,

    /// Create or update a profile (name from --profile, default "default")
    Init {
        /// Server URL for the profile
        #[arg(long = "url")]
        url: String,

        /// Topic that drives liveness
        #[arg(long, default_value = "live")]
        liveness_topic: String,

        /// Debounce window for range controls, milliseconds
        #[arg(long)]
        debounce_ms: Option<u64>,

        /// Overwrite an existing profile
        #[arg(long)]
        force: bool,
    },

    /// List configured profiles (default marked with *)
    Profiles,

    /// Make a profile the default
    Use {
        /// Profile name
        name: String,
    },
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
