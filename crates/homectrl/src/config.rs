//! CLI configuration: thin wrapper around `homectrl_config`.
//!
//! Adds resolution that respects `GlobalOpts` flag overrides
//! (--controller, --insecure, --timeout).

use std::time::Duration;

use homectrl_core::{EngineConfig, TlsVerification};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use homectrl_config::{
    Config, Profile, config_path, load_config_or_default, profile_to_engine_config,
    save_config,
};

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// Build an `EngineConfig` from the config file, profile, and CLI overrides.
///
/// Flags take priority over profile values. Without a matching profile a
/// `--controller` URL alone is enough.
pub fn build_engine_config(global: &GlobalOpts, cfg: &Config) -> Result<EngineConfig, CliError> {
    let profile_name = active_profile_name(global, cfg);

    let mut profile = match (cfg.profiles.get(&profile_name), &global.controller) {
        (Some(profile), _) => profile.clone(),
        (None, Some(url)) => Profile::new(url.clone()),
        (None, None) if global.profile.is_some() => {
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: available_profiles(cfg),
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    if let Some(ref url) = global.controller {
        profile.controller.clone_from(url);
    }

    let mut engine = profile_to_engine_config(&profile, &cfg.defaults)?;
    if global.insecure {
        engine.tls = TlsVerification::DangerAcceptInvalid;
    }
    if let Some(secs) = global.timeout {
        engine.timeout = Duration::from_secs(secs);
    }
    Ok(engine)
}

pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}
