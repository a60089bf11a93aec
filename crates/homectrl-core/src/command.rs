// ── Outbound control commands ──
//
// Every control mutation leaves the engine through one channel and one
// processor task, so commands reach the server in submission order.

use homectrl_api::{ControlRequest, RestClient};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{ControlKey, StateValue};

/// A single-control mutation scoped to one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlCommand {
    pub key: ControlKey,
    pub value: StateValue,
}

impl ControlCommand {
    pub fn new(key: ControlKey, value: StateValue) -> Self {
        Self { key, value }
    }

    pub fn to_request(&self) -> ControlRequest {
        ControlRequest {
            name: self.key.entity.clone(),
            control: self.key.control.clone(),
            value: self.value.to_json(),
        }
    }
}

/// A command plus an optional channel for its outcome. Dispatcher
/// commands carry no responder: they are fire-and-forget.
pub(crate) struct CommandEnvelope {
    pub command: ControlCommand,
    pub response_tx: Option<oneshot::Sender<Result<(), CoreError>>>,
}

impl CommandEnvelope {
    pub(crate) fn fire_and_forget(command: ControlCommand) -> Self {
        Self {
            command,
            response_tx: None,
        }
    }
}

pub(crate) type CommandSender = mpsc::UnboundedSender<CommandEnvelope>;
pub(crate) type CommandReceiver = mpsc::UnboundedReceiver<CommandEnvelope>;

/// Send commands one at a time until cancelled. Commands already queued
/// at cancellation are still sent.
pub(crate) async fn command_processor_task(
    client: RestClient,
    mut rx: CommandReceiver,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                execute(&client, envelope).await;
            }
            () = cancel.cancelled() => {
                rx.close();
                while let Ok(envelope) = rx.try_recv() {
                    execute(&client, envelope).await;
                }
                break;
            }
        }
    }
    debug!("command processor exited");
}

async fn execute(client: &RestClient, envelope: CommandEnvelope) {
    let CommandEnvelope {
        command,
        response_tx,
    } = envelope;

    let result = client
        .send_control(&command.to_request())
        .await
        .map_err(CoreError::from);

    match &result {
        Ok(()) => debug!(control = %command.key, value = %command.value, "control sent"),
        Err(e) => warn!(control = %command.key, value = %command.value, error = %e, "control dispatch failed"),
    }

    if let Some(tx) = response_tx {
        let _ = tx.send(result);
    }
}
