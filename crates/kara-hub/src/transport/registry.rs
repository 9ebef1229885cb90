//! Hub bookkeeping: listener records, live bindings, pending grace timers.

use std::collections::HashMap;
use std::sync::Arc;

use kara_common::WindowId;
use tokio::task::JoinHandle;

use super::connection::ConnectionHandle;
use crate::token::Token;

pub(super) type Callback = Arc<dyn Fn() + Send + Sync>;

/// What the hub knows about a window it expects to hear from.
pub(super) struct ListenerRecord {
    pub(super) token: Token,
    pub(super) on_open: Callback,
    pub(super) on_close: Callback,
}

pub(super) struct GraceTimer {
    pub(super) generation: u64,
    pub(super) task: JoinHandle<()>,
}

#[derive(Default)]
pub(super) struct HubState {
    pub(super) port: Option<u16>,
    pub(super) listeners: HashMap<WindowId, ListenerRecord>,
    /// At most one live connection per identity.
    pub(super) connections: HashMap<WindowId, ConnectionHandle>,
    /// At most one pending timer per identity.
    pub(super) grace_timers: HashMap<WindowId, GraceTimer>,
    next_generation: u64,
}

impl HubState {
    pub(super) fn next_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    pub(super) fn cancel_grace_timer(&mut self, id: &WindowId) {
        if let Some(timer) = self.grace_timers.remove(id) {
            timer.task.abort();
        }
    }

    /// Token and connection for an outbound send, if the window has both.
    pub(super) fn route_for(&self, id: &WindowId) -> Option<(ConnectionHandle, Token)> {
        let record = self.listeners.get(id)?;
        let connection = self.connections.get(id)?;
        Some((connection.clone(), record.token.clone()))
    }
}
