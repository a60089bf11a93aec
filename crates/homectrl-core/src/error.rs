// ── Core error types ──
//
// Errors surfaced by the engine's public operations. Transport failures
// inside background tasks never reach consumers as errors; they degrade
// to empty or stale data instead. The `From<homectrl_api::Error>` impl
// translates transport-layer errors for the calls that do return them.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to HomeCtrl server at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Engine is not running")]
    EngineStopped,

    // ── Control errors ───────────────────────────────────────────────
    #[error("Unknown control '{control}' on '{entity}'")]
    UnknownControl { entity: String, control: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Command rejected by server: {message}")]
    Rejected { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<homectrl_api::Error> for CoreError {
    fn from(err: homectrl_api::Error) -> Self {
        match err {
            homectrl_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout { timeout_secs: 0 }
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            homectrl_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            homectrl_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            homectrl_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            homectrl_api::Error::Api { status, message } if (400..500).contains(&status) => {
                CoreError::Rejected { message }
            }
            homectrl_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            homectrl_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket connection failed: {reason}"),
            },
            homectrl_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("WebSocket closed (code {code}): {reason}"),
            },
            homectrl_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
