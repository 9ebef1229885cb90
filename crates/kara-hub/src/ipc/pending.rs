//! Invokes the hub sent to windows, waiting for their replies.

use std::collections::HashMap;

use kara_common::{ApplicationMessage, WindowId};
use serde_json::Value;
use tokio::sync::oneshot;

struct PendingReply {
    channel: String,
    tx: oneshot::Sender<Vec<Value>>,
}

#[derive(Default)]
pub(super) struct PendingReplies {
    entries: HashMap<(WindowId, String), PendingReply>,
}

impl PendingReplies {
    pub(super) fn insert(
        &mut self,
        window: &WindowId,
        channel: &str,
        correlation_id: &str,
    ) -> oneshot::Receiver<Vec<Value>> {
        let (tx, rx) = oneshot::channel();
        self.entries.insert(
            (window.clone(), correlation_id.to_string()),
            PendingReply {
                channel: channel.to_string(),
                tx,
            },
        );
        rx
    }

    /// Complete the invoke `message` answers, if any. The entry must match
    /// on window, channel and correlation id; it is removed on match so a
    /// second reply with the same id falls through to normal routing.
    pub(super) fn resolve(&mut self, window: &WindowId, message: &ApplicationMessage) -> bool {
        let Some(cid) = message.correlation_id() else {
            return false;
        };
        let key = (window.clone(), cid.to_string());
        match self.entries.get(&key) {
            Some(entry) if entry.channel == message.channel => {}
            _ => return false,
        }
        let Some(entry) = self.entries.remove(&key) else {
            return false;
        };
        let _ = entry.tx.send(message.args[1..].to_vec());
        true
    }

    pub(super) fn cancel(&mut self, window: &WindowId, correlation_id: &str) {
        self.entries
            .remove(&(window.clone(), correlation_id.to_string()));
    }

    /// Drop every wait on `window`; their receivers see a closed channel.
    pub(super) fn drop_window(&mut self, window: &WindowId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|(owner, _), _| owner != window);
        before - self.entries.len()
    }

    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }
}
