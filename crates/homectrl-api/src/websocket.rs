//! Per-topic WebSocket feed with auto-reconnect.
//!
//! Each [`TopicFeed`] owns exactly one push connection for one topic. The
//! server pushes a full envelope `{ "result": [ ... ] }` on every change;
//! the feed unwraps it and forwards the `result` array, untouched, as a
//! [`FeedEvent::Snapshot`]. Connection lifecycle is reported in-band so the
//! consumer can reset its state in the same order the frames arrived.
//!
//! # Example
//!
//! ```rust,ignore
//! use homectrl_api::websocket::{FeedEvent, ReconnectConfig, TopicFeed};
//! use tokio_util::sync::CancellationToken;
//!
//! let cancel = CancellationToken::new();
//! let url = client.topic_url("temperature")?;
//! let mut feed = TopicFeed::connect(url, ReconnectConfig::default(), cancel.clone());
//!
//! while let Some(event) = feed.recv().await {
//!     if let FeedEvent::Snapshot(records) = event {
//!         println!("{} records", records.len());
//!     }
//! }
//! ```

use std::time::Duration;

use futures_util::StreamExt;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;

// ── Channel capacity ─────────────────────────────────────────────────

const FEED_CHANNEL_CAPACITY: usize = 64;

// ── FeedEvent ────────────────────────────────────────────────────────

/// What a topic feed reports to its single consumer, in receipt order.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A (re)connection succeeded. Nothing from before it is valid anymore.
    Connected,
    /// A full snapshot: the envelope's `result` array.
    Snapshot(Vec<serde_json::Value>),
    /// The channel dropped; a reconnect is pending.
    Disconnected { attempt: u32 },
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for feed reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── TopicFeed ────────────────────────────────────────────────────────

/// Receiving end of a running topic connection.
///
/// Dropping the feed closes the channel; the background task notices on
/// its next send and exits. Cancelling the token tears it down at once.
pub struct TopicFeed {
    url: Url,
    events: mpsc::Receiver<FeedEvent>,
    cancel: CancellationToken,
}

impl TopicFeed {
    /// Spawn the connection loop for `url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background and is announced with [`FeedEvent::Connected`].
    pub fn connect(url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        let (event_tx, events) = mpsc::channel(FEED_CHANNEL_CAPACITY);

        let task_url = url.clone();
        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            feed_loop(task_url, event_tx, reconnect, task_cancel).await;
        });

        Self {
            url,
            events,
            cancel,
        }
    }

    /// The topic URL this feed is connected to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Wait for the next event. `None` once the loop has exited.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.events.recv().await
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TopicFeed {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on drop, report, backoff → reconnect.
async fn feed_loop(
    url: Url,
    event_tx: mpsc::Sender<FeedEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&url, &event_tx, &cancel) => result,
        };

        if cancel.is_cancelled() || event_tx.is_closed() {
            break;
        }

        match result {
            // Clean disconnect: reset backoff, then wait the initial delay.
            Ok(()) => {
                tracing::info!(url = %url, "topic feed disconnected cleanly, reconnecting");
                attempt = 0;
                if event_tx.send(FeedEvent::Disconnected { attempt }).await.is_err() {
                    break;
                }

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(reconnect.initial_delay) => {}
                }
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, attempt, "topic feed error");
                if event_tx.send(FeedEvent::Disconnected { attempt }).await.is_err() {
                    break;
                }

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            url = %url,
                            max_retries = max,
                            "topic feed reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::debug!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    tracing::debug!(url = %url, "topic feed loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish a single connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    event_tx: &mpsc::Sender<FeedEvent>,
    cancel: &CancellationToken,
) -> Result<(), Error> {
    tracing::debug!(url = %url, "connecting topic feed");

    let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
        .await
        .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!(url = %url, "topic feed connected");
    if event_tx.send(FeedEvent::Connected).await.is_err() {
        return Ok(());
    }

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if let Some(records) = parse_envelope(&text) {
                            if event_tx.send(FeedEvent::Snapshot(records)).await.is_err() {
                                return Ok(());
                            }
                        }
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        return match frame {
                            Some(cf) => Err(Error::WebSocketClosed {
                                code: u16::from(cf.code),
                                reason: cf.reason.to_string(),
                            }),
                            None => Ok(()),
                        };
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        tracing::debug!(url = %url, "topic feed stream ended");
                        return Ok(());
                    }
                    Some(Ok(_)) => {
                        // Binary, Ping, Pong, Frame -- nothing to apply
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Envelope the server pushes on every topic: `{ "status": "OK", "result": [...] }`.
#[derive(Debug, Deserialize)]
struct FeedEnvelope {
    result: Vec<serde_json::Value>,
}

/// Extract the `result` array from a text frame.
///
/// Malformed frames are dropped here so the consumer keeps its previous
/// snapshot.
fn parse_envelope(text: &str) -> Option<Vec<serde_json::Value>> {
    match serde_json::from_str::<FeedEnvelope>(text) {
        Ok(envelope) => Some(envelope.result),
        Err(e) => {
            tracing::debug!(error = %e, "dropping malformed feed frame");
            None
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(16)).unwrap_or(16);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
