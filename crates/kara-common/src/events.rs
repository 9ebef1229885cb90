use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::id::WindowId;

/// Process-wide notifications surfaced to the orchestration layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum AppEvent {
    /// The transport hub is bound and accepting connections.
    Ready { port: u16 },
    WindowOpened(WindowId),
    WindowReady(WindowId),
    WindowClosed(WindowId),
    /// The live window count dropped to zero.
    AllWindowsClosed,
    Shutdown,
}

pub struct EventBus {
    sender: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: AppEvent) -> usize {
        tracing::debug!(?event, "app event");
        self.sender.send(event).unwrap_or(0)
    }
}
