use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

use crate::types::{ViewCommand, ViewEvent};

/// Broadcast event stream type used by rendering-layer subscribers.
pub type EventStream = broadcast::Receiver<ViewEvent>;

/// Errors returned by view channel operations.
#[derive(Debug, Error)]
pub enum ViewChannelError {
    /// The command receiver side is closed.
    #[error("command channel is closed")]
    CommandChannelClosed,
}

/// Command/event channel pair connecting the runtime and the rendering layer.
#[derive(Clone, Debug)]
pub struct ViewChannels {
    command_tx: mpsc::Sender<ViewCommand>,
    event_tx: broadcast::Sender<ViewEvent>,
}

impl ViewChannels {
    /// Create a new channel set and return it with the command receiver.
    pub fn new(
        command_buffer: usize,
        event_buffer: usize,
    ) -> (Self, mpsc::Receiver<ViewCommand>) {
        let (command_tx, command_rx) = mpsc::channel(command_buffer.max(1));
        let (event_tx, _) = broadcast::channel(event_buffer.max(1));

        (
            Self {
                command_tx,
                event_tx,
            },
            command_rx,
        )
    }

    /// Clone the command sender.
    pub fn command_sender(&self) -> mpsc::Sender<ViewCommand> {
        self.command_tx.clone()
    }

    /// Clone the event sender.
    pub fn event_sender(&self) -> broadcast::Sender<ViewEvent> {
        self.event_tx.clone()
    }

    /// Subscribe to emitted view events.
    pub fn subscribe(&self) -> EventStream {
        self.event_tx.subscribe()
    }

    /// Send one command to the runtime.
    pub async fn send_command(&self, command: ViewCommand) -> Result<(), ViewChannelError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| ViewChannelError::CommandChannelClosed)
    }

    /// Emit an event to all subscribers.
    ///
    /// Emission is best-effort; lagged subscribers are handled by `broadcast`.
    pub fn emit(&self, event: ViewEvent) {
        let _ = self.event_tx.send(event);
    }
}
