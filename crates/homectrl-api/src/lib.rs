//! Transport layer for the HomeCtrl dashboard engine.
//!
//! - [`RestClient`] talks to the one-shot endpoints: the capability schema
//!   fetch and the single-control mutation request.
//! - [`TopicFeed`] owns one push connection for one topic and yields
//!   [`FeedEvent`]s, reconnecting with backoff when the channel drops.
//!
//! Payloads are kept as opaque `serde_json::Value` records here; typing them
//! per topic is the business of `homectrl-core`.

pub mod client;
pub mod error;
pub mod models;
pub mod transport;
pub mod websocket;

pub use client::{DEFAULT_API_PREFIX, RestClient};
pub use error::Error;
pub use models::{CapabilitiesResponse, ControlRequest, DeviceCapabilities, RawConstraints, RawControl};
pub use transport::{TlsMode, TransportConfig};
pub use websocket::{FeedEvent, ReconnectConfig, TopicFeed};
