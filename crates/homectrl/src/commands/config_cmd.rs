//! Config subcommand handlers.

use std::fmt::Write as _;

use homectrl_core::Topic;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

fn format_config(cfg: &Config) -> Result<String, CliError> {
    Ok(toml::to_string_pretty(cfg)?)
}

fn validate_url(url: &str) -> Result<(), CliError> {
    url::Url::parse(url)
        .map(|_| ())
        .map_err(|e| CliError::Validation {
            field: "url".into(),
            reason: format!("'{url}' is not a valid URL: {e}"),
        })
}

fn validate_topic(topic: &str) -> Result<(), CliError> {
    topic
        .parse::<Topic>()
        .map(|_| ())
        .map_err(|_| CliError::Validation {
            field: "liveness_topic".into(),
            reason: format!("unknown topic '{topic}'"),
        })
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }

        ConfigCommand::Show => {
            let cfg = config::load_config_or_default();
            let out = if matches!(global.output, OutputFormat::Table) {
                format_config(&cfg)?
            } else {
                output::render_single(&global.output, &cfg, |_| String::new(), |c| {
                    let mut out = String::new();
                    for (name, p) in &c.profiles {
                        let _ = writeln!(out, "{name}\t{}", p.controller);
                    }
                    out.trim_end().to_owned()
                })
            };
            output::print_output(&out, global.quiet);
            Ok(())
        }

        ConfigCommand::Init {
            url,
            liveness_topic,
            debounce_ms,
            force,
        } => {
            validate_url(&url)?;
            validate_topic(&liveness_topic)?;

            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            if cfg.profiles.contains_key(&profile_name) && !force {
                return Err(CliError::Validation {
                    field: "profile".into(),
                    reason: format!(
                        "profile '{profile_name}' already exists (use --force to overwrite)"
                    ),
                });
            }

            let mut profile = Profile::new(url);
            profile.liveness_topic = liveness_topic;
            profile.debounce_ms = debounce_ms;
            if global.insecure {
                profile.insecure = Some(true);
            }
            if let Some(timeout) = global.timeout {
                profile.timeout = Some(timeout);
            }

            cfg.profiles.insert(profile_name.clone(), profile);
            if cfg.default_profile.is_none() || cfg.profiles.len() == 1 {
                cfg.default_profile = Some(profile_name.clone());
            }

            let path = config::save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Profile '{profile_name}' written to {}", path.display());
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: homectrl config init --url <url>");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    name,
                    available: config::available_profiles(&cfg),
                });
            }

            cfg.default_profile = Some(name.clone());
            config::save_config(&cfg)?;
            eprintln!("✓ Default profile set to '{name}'");
            Ok(())
        }
    }
}
