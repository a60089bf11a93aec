// ── Engine facade ──
//
// Owns every stream, the registry, the dispatcher and the background
// tasks for one HomeCtrl server. Consumers query it; nothing it runs in
// the background ever returns an error to them.

use std::sync::Arc;

use homectrl_api::{RestClient, TopicFeed};
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::command::{
    CommandEnvelope, CommandReceiver, CommandSender, ControlCommand, command_processor_task,
};
use crate::config::EngineConfig;
use crate::control::{ControlDispatcher, ControlPanel, ControlStateStream, ControlView};
use crate::error::CoreError;
use crate::liveness::LivenessIndex;
use crate::model::{ControlKey, DeviceState, StateValue, TopicRecord};
use crate::registry::{Capabilities, CapabilityRegistry};
use crate::stream::{FeedSink, FeedTask, SnapshotStream, SnapshotView, Subscription, spawn_feed};
use crate::topic::Topic;

/// Lifecycle state of an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Created, not started.
    Idle,
    Running,
    /// Shut down. Terminal.
    Stopped,
}

/// The main entry point for consumers.
///
/// Cheaply cloneable. Create with [`new`](Self::new), then
/// [`start`](Self::start) inside a tokio runtime.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    client: RestClient,
    registry: CapabilityRegistry,
    liveness: Arc<SnapshotStream<DeviceState>>,
    control_state: Arc<ControlStateStream>,
    dispatcher: ControlDispatcher,
    command_tx: CommandSender,
    command_rx: Mutex<Option<CommandReceiver>>,
    state: watch::Sender<EngineState>,
    cancel: CancellationToken,
    feeds: Mutex<Vec<FeedTask>>,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Engine {
    /// Build an engine. Does NOT connect; call [`start`](Self::start).
    pub fn new(config: EngineConfig) -> Result<Self, CoreError> {
        let client = RestClient::new(config.url.clone(), &config.api_prefix, &config.transport())?;
        Ok(Self::with_client(config, client))
    }

    /// Build an engine around an existing REST client.
    pub fn with_client(config: EngineConfig, client: RestClient) -> Self {
        let registry = CapabilityRegistry::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let dispatcher = ControlDispatcher::new(registry.clone(), config.debounce, command_tx.clone());
        let control_state = Arc::new(ControlStateStream::new(dispatcher.clone()));
        let liveness = Arc::new(SnapshotStream::new(config.liveness_topic));
        let (state, _) = watch::channel(EngineState::Idle);

        Self {
            inner: Arc::new(EngineInner {
                config,
                client,
                registry,
                liveness,
                control_state,
                dispatcher,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                state,
                cancel: CancellationToken::new(),
                feeds: Mutex::new(Vec::new()),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn state(&self) -> EngineState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Fetch capabilities (once), open the liveness and control-state
    /// feeds, and spawn the command processor and debounce timer.
    ///
    /// Calling it again while running is a no-op. A failed capability
    /// fetch does not fail the start: the registry stays empty.
    pub async fn start(&self) -> Result<(), CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::EngineStopped);
        }

        let liveness_url = self.topic_url(self.inner.config.liveness_topic)?;
        let state_url = self.topic_url(Topic::State)?;

        let Some(command_rx) = self.inner.command_rx.lock().await.take() else {
            debug!("engine already started");
            return Ok(());
        };

        info!(url = %self.inner.config.url, "starting engine");

        let caps = self.load_capabilities().await;
        info!(entities = caps.entity_count(), "capability registry ready");

        {
            let mut feeds = self.inner.feeds.lock().await;
            feeds.push(self.open_feed(liveness_url, Arc::clone(&self.inner.liveness)));
            feeds.push(self.open_feed(state_url, Arc::clone(&self.inner.control_state)));
        }

        {
            let mut handles = self.inner.task_handles.lock().await;
            handles.push(tokio::spawn(command_processor_task(
                self.inner.client.clone(),
                command_rx,
                self.inner.cancel.clone(),
            )));
            handles.push(tokio::spawn(
                self.inner.dispatcher.clone().run_timer(self.inner.cancel.clone()),
            ));
        }

        self.inner.state.send_replace(EngineState::Running);
        Ok(())
    }

    /// Stop everything: close every feed and subscription, discard
    /// pending edits, send commands already queued, and join the tasks.
    pub async fn shutdown(&self) {
        if self.inner.cancel.is_cancelled() {
            return;
        }
        info!("shutting down engine");
        self.inner.cancel.cancel();

        for mut feed in self.inner.feeds.lock().await.drain(..) {
            feed.stop().await;
        }
        let mut handles = self.inner.task_handles.lock().await;
        for handle in handles.drain(..) {
            let _ = handle.await;
        }
        drop(handles);

        self.inner.liveness.close();
        self.inner.control_state.close();
        self.inner.state.send_replace(EngineState::Stopped);
        debug!("engine stopped");
    }

    // ── Streams ──────────────────────────────────────────────────

    /// Open an independent feed for `topic`, decoding records as `T`.
    ///
    /// Must be called inside a tokio runtime. If `T` does not match the
    /// topic's record shape every message is dropped as malformed and the
    /// snapshot stays empty.
    pub fn subscribe<T: TopicRecord>(&self, topic: Topic) -> Result<Subscription<T>, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::EngineStopped);
        }
        let url = self.topic_url(topic)?;
        let token = self.inner.cancel.child_token();
        let feed = TopicFeed::connect(url, self.inner.config.reconnect.clone(), token.clone());
        debug!(%topic, "subscribed");
        Ok(Subscription::spawn(Arc::new(SnapshotStream::new(topic)), feed, token))
    }

    /// Close a subscription and discard its snapshot.
    pub async fn unsubscribe<T: TopicRecord>(&self, subscription: Subscription<T>) {
        let topic = subscription.topic();
        subscription.unsubscribe().await;
        debug!(%topic, "unsubscribed");
    }

    /// Liveness lookups over the configured liveness topic.
    pub fn liveness(&self) -> LivenessIndex {
        LivenessIndex::new(self.liveness_view())
    }

    pub fn liveness_view(&self) -> SnapshotView<DeviceState> {
        SnapshotView::new(
            self.inner.liveness.subscribe(),
            self.inner.liveness.watch_connection_state(),
        )
    }

    pub fn control_state(&self) -> &Arc<ControlStateStream> {
        &self.inner.control_state
    }

    // ── Controls ─────────────────────────────────────────────────

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.inner.registry
    }

    /// Fetch the capability schema unless already loaded. Needs no push
    /// channel, so it works without [`start`](Self::start).
    pub async fn load_capabilities(&self) -> Arc<Capabilities> {
        let client = self.inner.client.clone();
        self.inner
            .registry
            .load_with(|| async move { client.fetch_capabilities().await.map_err(CoreError::from) })
            .await
    }

    /// Loaded capabilities; empty before loading or after a failed fetch.
    pub fn capabilities(&self) -> Arc<Capabilities> {
        self.inner.registry.get()
    }

    pub fn dispatcher(&self) -> &ControlDispatcher {
        &self.inner.dispatcher
    }

    /// Open a control view for submitting edits.
    pub fn view(&self) -> ControlView {
        self.inner.dispatcher.view()
    }

    /// Controls of every alive entity, with their displayed values.
    pub fn control_panel(&self) -> ControlPanel {
        ControlPanel::build(&self.capabilities(), &self.liveness(), &self.inner.control_state)
    }

    /// Validate and send one control command now, bypassing the debounce
    /// window, and wait for the server's answer.
    ///
    /// Goes through the same queue as dispatcher commands, so ordering
    /// with earlier edits is preserved.
    pub async fn execute(
        &self,
        entity: &str,
        control: &str,
        value: StateValue,
    ) -> Result<(), CoreError> {
        if self.state() != EngineState::Running {
            return Err(CoreError::EngineStopped);
        }
        let descriptor = self.inner.registry.descriptor(entity, control).ok_or_else(|| {
            CoreError::UnknownControl {
                entity: entity.to_owned(),
                control: control.to_owned(),
            }
        })?;
        descriptor
            .validate(&value)
            .map_err(|message| CoreError::ValidationFailed { message })?;

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: ControlCommand::new(ControlKey::new(entity, control), value),
                response_tx: Some(tx),
            })
            .map_err(|_| CoreError::EngineStopped)?;

        rx.await.map_err(|_| CoreError::EngineStopped)?
    }

    // ── Internals ────────────────────────────────────────────────

    fn topic_url(&self, topic: Topic) -> Result<Url, CoreError> {
        Ok(self.inner.client.topic_url(topic.as_str())?)
    }

    fn open_feed<S: FeedSink>(&self, url: Url, sink: Arc<S>) -> FeedTask {
        let token = self.inner.cancel.child_token();
        debug!(%url, "opening feed");
        let feed = TopicFeed::connect(url, self.inner.config.reconnect.clone(), token.clone());
        spawn_feed(feed, sink, token)
    }
}
