//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use homectrl_config::ConfigError;
use homectrl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to HomeCtrl server at {url}")]
    #[diagnostic(
        code(homectrl::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             URL: {url}\n\
             Try: homectrl capabilities --controller <url>"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("TLS setup failed: {reason}")]
    #[diagnostic(
        code(homectrl::tls_error),
        help(
            "For a self-signed server use --insecure (-k), \
             or configure ca_cert in your profile."
        )
    )]
    TlsError { reason: String },

    // ── Controls ─────────────────────────────────────────────────────
    #[error("Unknown control '{control}' on '{entity}'")]
    #[diagnostic(
        code(homectrl::unknown_control),
        help("Run: homectrl capabilities to see the controls each device reports")
    )]
    UnknownControl { entity: String, control: String },

    #[error("Server rejected the command: {message}")]
    #[diagnostic(code(homectrl::rejected))]
    Rejected { message: String },

    // ── API ──────────────────────────────────────────────────────────
    #[error("API error: {message}")]
    #[diagnostic(code(homectrl::api_error), help("HTTP status: {status:?}"))]
    ApiError { status: Option<u16>, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(homectrl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(homectrl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: homectrl config init --url <url>"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No server configured")]
    #[diagnostic(
        code(homectrl::no_config),
        help(
            "Pass --controller <url>, set HOMECTRL_CONTROLLER, \
             or create a profile with: homectrl config init --url <url>\n\
             Config file: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(homectrl::config))]
    Config(#[from] ConfigError),

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("Request timed out after {seconds}s")]
    #[diagnostic(
        code(homectrl::timeout),
        help("Increase timeout with --timeout or check server responsiveness.")
    )]
    Timeout { seconds: u64 },

    #[error("Engine is not running")]
    #[diagnostic(code(homectrl::engine_stopped))]
    EngineStopped,

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render TOML: {0}")]
    #[diagnostic(code(homectrl::toml))]
    Toml(#[from] toml::ser::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::TlsError { .. } | Self::EngineStopped => {
                exit_code::CONNECTION
            }
            Self::UnknownControl { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => {
                if reason.starts_with("TLS error") {
                    CliError::TlsError { reason }
                } else {
                    CliError::ConnectionFailed {
                        url,
                        source: reason.into(),
                    }
                }
            }

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::EngineStopped => CliError::EngineStopped,

            CoreError::UnknownControl { entity, control } => {
                CliError::UnknownControl { entity, control }
            }

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "value".into(),
                reason: message,
            },

            CoreError::Rejected { message } => CliError::Rejected { message },

            CoreError::Api { message, status } => CliError::ApiError { status, message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                status: None,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_exit_codes() {
        let unknown: CliError = CoreError::UnknownControl {
            entity: "dev".into(),
            control: "x".into(),
        }
        .into();
        assert_eq!(unknown.exit_code(), exit_code::NOT_FOUND);

        let invalid: CliError = CoreError::ValidationFailed {
            message: "out of range".into(),
        }
        .into();
        assert_eq!(invalid.exit_code(), exit_code::USAGE);

        let tls: CliError = CoreError::ConnectionFailed {
            url: String::new(),
            reason: "TLS error: bad cert".into(),
        }
        .into();
        assert!(matches!(tls, CliError::TlsError { .. }));
        assert_eq!(tls.exit_code(), exit_code::CONNECTION);

        let rejected: CliError = CoreError::Rejected {
            message: "device name error".into(),
        }
        .into();
        assert_eq!(rejected.exit_code(), exit_code::GENERAL);
    }
}
