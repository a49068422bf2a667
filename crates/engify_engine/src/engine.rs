use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use engify_core::{BackgroundReply, RelayCall, RelayOutcome, RequestId};
use engify_logging::engify_error;

use crate::relay_client::{RelayClient, StatusSink};
use crate::{CallError, FailureKind, RelayEvent};

enum RelayCommand {
    Call(RelayCall),
}

/// Background relay caller: a worker thread owning a tokio runtime.
///
/// Calls are fire-and-forget; results come back through [`RelayHandle::try_recv`].
pub struct RelayHandle {
    cmd_tx: mpsc::Sender<RelayCommand>,
    event_rx: mpsc::Receiver<RelayEvent>,
}

impl RelayHandle {
    pub fn new(client: RelayClient) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let client = Arc::new(client);

        thread::spawn(move || {
            let runtime = match tokio::runtime::Runtime::new() {
                Ok(runtime) => runtime,
                Err(err) => {
                    engify_error!("Failed to start relay runtime: {}", err);
                    return;
                }
            };
            while let Ok(command) = cmd_rx.recv() {
                let client = client.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(client.as_ref(), command, event_tx).await;
                });
            }
        });

        Self { cmd_tx, event_rx }
    }

    /// Queues a call. Returns `false` when the worker is gone and nobody will answer.
    pub fn enqueue(&self, call: RelayCall) -> bool {
        self.cmd_tx.send(RelayCommand::Call(call)).is_ok()
    }

    pub fn try_recv(&self) -> Option<RelayEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<RelayEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

struct ChannelStatusSink {
    request_id: RequestId,
    tx: mpsc::Sender<RelayEvent>,
}

impl StatusSink for ChannelStatusSink {
    fn status(&self, status: &str) {
        let _ = self.tx.send(RelayEvent::Status {
            request_id: self.request_id,
            status: status.to_string(),
        });
    }
}

async fn handle_command(
    client: &RelayClient,
    command: RelayCommand,
    event_tx: mpsc::Sender<RelayEvent>,
) {
    match command {
        RelayCommand::Call(call) => {
            let sink = ChannelStatusSink {
                request_id: call.request_id,
                tx: event_tx.clone(),
            };
            let result = client.call(&call, &sink).await;
            let _ = event_tx.send(RelayEvent::Completed {
                request_id: call.request_id,
                result,
            });
        }
    }
}

/// Error used when a call could not be handed to the worker.
pub(crate) fn no_responder() -> CallError {
    CallError::new(FailureKind::NoResponder, "No response from background")
}

/// Outcome of a finished call; `None` when nobody answered.
pub fn relay_outcome(result: Result<String, CallError>) -> Option<RelayOutcome> {
    match result {
        Ok(enhanced_text) => Some(RelayOutcome::Success { enhanced_text }),
        Err(err) if err.kind == FailureKind::NoResponder => None,
        Err(err) => Some(RelayOutcome::Failure {
            error_message: err.message,
            http_status_hint: err.status,
        }),
    }
}

/// The reply the page sees for a finished call; `None` when nobody answered.
pub fn background_reply(result: Result<String, CallError>) -> Option<BackgroundReply> {
    relay_outcome(result).map(BackgroundReply::from)
}
