//! Invokes this renderer sent to the hub, keyed by correlation id.

use std::collections::HashMap;

use kara_common::ApplicationMessage;
use serde_json::Value;
use tokio::sync::oneshot;

#[derive(Default)]
pub(crate) struct PendingInvokes {
    entries: HashMap<String, (String, oneshot::Sender<Vec<Value>>)>,
}

impl PendingInvokes {
    pub(crate) fn insert(&mut self, correlation_id: &str, method: &str) -> oneshot::Receiver<Vec<Value>> {
        let (tx, rx) = oneshot::channel();
        self.entries
            .insert(correlation_id.to_string(), (method.to_string(), tx));
        rx
    }

    /// Complete the invoke `message` answers. Only a reply on the same
    /// method with the same correlation id counts, and only once.
    pub(crate) fn resolve(&mut self, message: &ApplicationMessage) -> bool {
        let Some(cid) = message.correlation_id() else {
            return false;
        };
        match self.entries.get(cid) {
            Some((method, _)) if *method == message.channel => {}
            _ => return false,
        }
        let Some((_, tx)) = self.entries.remove(cid) else {
            return false;
        };
        let _ = tx.send(message.args[1..].to_vec());
        true
    }

    pub(crate) fn remove(&mut self, correlation_id: &str) {
        self.entries.remove(correlation_id);
    }

    /// Fail every outstanding invoke.
    pub(crate) fn clear(&mut self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
