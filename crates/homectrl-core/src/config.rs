// ── Runtime engine configuration ──
//
// Describes how to reach a HomeCtrl server and how the engine behaves.
// The CLI builds an `EngineConfig` from its profile and hands it in; the
// core never reads config files.

use std::path::PathBuf;
use std::time::Duration;

use homectrl_api::{ReconnectConfig, TlsMode, TransportConfig};
pub use homectrl_api::DEFAULT_API_PREFIX;
use url::Url;

use crate::topic::Topic;

/// Default debounce window for range controls.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed certs).
    DangerAcceptInvalid,
}

/// Configuration for one engine instance.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Server base URL (e.g., `http://homectrl.local:8000`).
    pub url: Url,
    /// Path prefix of the REST and push endpoints.
    pub api_prefix: String,
    pub tls: TlsVerification,
    /// Request timeout for REST calls.
    pub timeout: Duration,
    /// Debounce window for range edits.
    pub debounce: Duration,
    /// Topic whose snapshot drives the liveness index.
    pub liveness_topic: Topic,
    /// Reconnect policy shared by every topic feed.
    pub reconnect: ReconnectConfig,
}

impl EngineConfig {
    /// Defaults for everything but the server URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            api_prefix: DEFAULT_API_PREFIX.to_owned(),
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(10),
            debounce: DEFAULT_DEBOUNCE,
            liveness_topic: Topic::Live,
            reconnect: ReconnectConfig::default(),
        }
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        let tls = match &self.tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        };
        TransportConfig {
            tls,
            timeout: self.timeout,
        }
    }
}
