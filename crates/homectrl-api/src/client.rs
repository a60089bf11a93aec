// REST client for the one-shot HomeCtrl endpoints.
//
// Wraps `reqwest::Client` with prefix-aware URL construction. The only
// two calls the dashboard engine makes over plain HTTP are the capability
// schema fetch and the single-control mutation.

use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{CapabilitiesResponse, ControlRequest};
use crate::transport::TransportConfig;

/// Default API mount point on the HomeCtrl server.
pub const DEFAULT_API_PREFIX: &str = "/homectrl/v1";

/// HTTP client for the HomeCtrl REST API.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: Url,
    prefix: String,
}

impl RestClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the server root (e.g. `http://homectrl.local:8000`),
    /// `prefix` the API mount point (e.g. `/homectrl/v1`).
    pub fn new(base_url: Url, prefix: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, prefix))
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url, prefix: &str) -> Self {
        Self {
            http,
            base_url,
            prefix: normalize_prefix(prefix),
        }
    }

    /// The server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The API prefix (always starts with `/`, never ends with one).
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// `GET {prefix}/capabilities`.
    ///
    /// A `null` body means the server has not seen any capability
    /// announcement yet and decodes as an empty map.
    pub async fn fetch_capabilities(&self) -> Result<CapabilitiesResponse, Error> {
        let url = self.api_url("capabilities")?;
        debug!(%url, "fetching capabilities");
        let caps: Option<CapabilitiesResponse> = self.get_json(url).await?;
        Ok(caps.unwrap_or_default())
    }

    /// `POST {prefix}/control` with a `{name, <control>: value}` body.
    pub async fn send_control(&self, request: &ControlRequest) -> Result<(), Error> {
        let url = self.api_url("control")?;
        debug!(
            %url,
            entity = %request.name,
            control = %request.control,
            "sending control"
        );
        let resp = self.http.post(url).json(request).send().await?;
        check_status(resp).await.map(|_| ())
    }

    /// WebSocket URL for a topic: `{ws|wss}://host{prefix}/ws/{topic}`.
    pub fn topic_url(&self, topic: &str) -> Result<Url, Error> {
        let mut url = self.api_url(&format!("ws/{topic}"))?;
        let scheme = if self.base_url.scheme() == "https" {
            "wss"
        } else {
            "ws"
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::WebSocketConnect(format!("cannot derive {scheme} URL from {url}")))?;
        Ok(url)
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(&format!("{}/{path}", self.prefix))?)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let resp = self.http.get(url).send().await?;
        let body = check_status(resp).await?;
        trace!(len = body.len(), "response body received");
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })
    }
}

/// Turn a non-2xx response into `Error::Api`, otherwise return the body.
async fn check_status(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(String::from))
        .unwrap_or(body);
    Err(Error::Api {
        status: status.as_u16(),
        message,
    })
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}
