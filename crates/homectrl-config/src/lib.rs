//! Shared configuration for HomeCtrl tools.
//!
//! TOML profiles merged with `HOMECTRL_` environment overrides, and
//! translation to `homectrl_core::EngineConfig`. The CLI layers its
//! flag overrides on top.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use homectrl_core::{EngineConfig, TlsVerification, Topic};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named server profiles.
    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Resolve a profile: the named one, else the default profile.
    pub fn profile(&self, name: Option<&str>) -> Result<(&str, &Profile), ConfigError> {
        let name = name
            .or(self.default_profile.as_deref())
            .unwrap_or("default");
        self.profiles
            .get_key_value(name)
            .map(|(k, v)| (k.as_str(), v))
            .ok_or_else(|| ConfigError::UnknownProfile { name: name.into() })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// REST request timeout, seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Debounce window for range controls, milliseconds.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_debounce_ms() -> u64 {
    300
}

/// A named server profile.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Profile {
    /// Server base URL (e.g., "http://homectrl.local:8000").
    pub controller: String,

    /// Path prefix of the REST and push endpoints.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Topic that drives liveness ("live", "presence", ...).
    #[serde(default = "default_liveness_topic")]
    pub liveness_topic: String,

    /// Override the default debounce window.
    pub debounce_ms: Option<u64>,

    /// Path to custom CA certificate (REST requests only).
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting. Applies to REST requests only.
    pub insecure: Option<bool>,

    /// Override timeout.
    pub timeout: Option<u64>,
}

impl Profile {
    pub fn new(controller: impl Into<String>) -> Self {
        Self {
            controller: controller.into(),
            api_prefix: default_api_prefix(),
            liveness_topic: default_liveness_topic(),
            debounce_ms: None,
            ca_cert: None,
            insecure: None,
            timeout: None,
        }
    }
}

fn default_api_prefix() -> String {
    homectrl_core::DEFAULT_API_PREFIX.into()
}
fn default_liveness_topic() -> String {
    Topic::Live.as_str().into()
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("org", "dzem", "homectrl").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("homectrl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
///
/// Environment keys nest with `__`, e.g.
/// `HOMECTRL_DEFAULTS__DEBOUNCE_MS=150` or
/// `HOMECTRL_PROFILES__HOME__CONTROLLER=http://hub:8000`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("HOMECTRL_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

/// Build an `EngineConfig` from a profile and the global defaults.
pub fn profile_to_engine_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<EngineConfig, ConfigError> {
    let url: url::Url = profile
        .controller
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "controller".into(),
            reason: format!("invalid URL: {}", profile.controller),
        })?;

    let liveness_topic: Topic =
        profile
            .liveness_topic
            .parse()
            .map_err(|_| ConfigError::Validation {
                field: "liveness_topic".into(),
                reason: format!("unknown topic '{}'", profile.liveness_topic),
            })?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = EngineConfig::new(url);
    config.api_prefix.clone_from(&profile.api_prefix);
    config.liveness_topic = liveness_topic;
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.debounce = Duration::from_millis(profile.debounce_ms.unwrap_or(defaults.debounce_ms));
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.default_profile.as_deref(), Some("default"));
        assert_eq!(config.defaults.debounce_ms, 300);
        assert!(config.profiles.is_empty());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        let mut home = Profile::new("http://hub.local:8000");
        home.debounce_ms = Some(150);
        home.liveness_topic = "presence".into();
        config.profiles.insert("default".into(), home.clone());
        save_config_to(&config, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        let (name, profile) = loaded.profile(None).unwrap();
        assert_eq!(name, "default");
        assert_eq!(profile, &home);
    }

    #[test]
    fn profile_fields_fill_in_from_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
default_profile = "lab"

[defaults]
timeout = 4

[profiles.lab]
controller = "https://lab:8443"
insecure = true
"#,
        )
        .unwrap();

        let config = load_config_from(&path).unwrap();
        let (_, profile) = config.profile(None).unwrap();
        assert_eq!(profile.api_prefix, "/homectrl/v1");

        let engine = profile_to_engine_config(profile, &config.defaults).unwrap();
        assert_eq!(engine.url.as_str(), "https://lab:8443/");
        assert_eq!(engine.timeout, Duration::from_secs(4));
        assert_eq!(engine.debounce, Duration::from_millis(300));
        assert_eq!(engine.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(engine.liveness_topic, Topic::Live);
    }

    #[test]
    fn unknown_profile_and_bad_values_are_errors() {
        let config = Config::default();
        assert!(matches!(
            config.profile(Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));

        let mut profile = Profile::new("not a url");
        assert!(matches!(
            profile_to_engine_config(&profile, &Defaults::default()),
            Err(ConfigError::Validation { ref field, .. }) if field == "controller"
        ));

        profile.controller = "http://hub".into();
        profile.liveness_topic = "weather".into();
        assert!(matches!(
            profile_to_engine_config(&profile, &Defaults::default()),
            Err(ConfigError::Validation { ref field, .. }) if field == "liveness_topic"
        ));
    }
}
