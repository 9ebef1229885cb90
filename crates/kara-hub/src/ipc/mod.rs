//! IPC dispatcher: named invoke handlers and channel listeners.
//!
//! Every authenticated application message from a window lands here.
//! Listeners registered with [`Dispatcher::on`] see every message on
//! their channel. If a handler is registered for the channel, the message
//! is treated as an invoke: `args[0]` is the caller's correlation id, the
//! rest goes to the handler, and the outcome is sent back on the same
//! channel as `[correlation id, error | null, result | null]`.
//!
//! The hub can also invoke renderer-side handlers (see
//! [`crate::Window::invoke`]); replies to those are matched here before
//! any handler lookup.

mod handler;
mod pending;


use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use kara_common::{ApplicationMessage, KaraError, WindowId};
use serde_json::Value;
use tokio::sync::oneshot;

use crate::transport::{CallContext, InboundRouter};

pub use handler::{HandlerError, HandlerResult, InvokeHandler, IpcRequest};

use pending::PendingReplies;

/// A message a window sent on some channel.
#[derive(Debug, Clone, PartialEq)]
pub struct IpcEvent {
    pub window_id: WindowId,
    pub channel: String,
    pub args: Vec<Value>,
}

type Listener = Arc<dyn Fn(&IpcEvent) + Send + Sync>;

#[derive(Default)]
pub struct Dispatcher {
    handlers: RwLock<HashMap<String, Arc<dyn InvokeHandler>>>,
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    pending: Mutex<PendingReplies>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the handler for `method`. A method has at most one
    /// handler; registering a second one fails.
    pub fn handle<H>(&self, method: impl Into<String>, handler: H) -> Result<(), KaraError>
    where
        H: InvokeHandler + 'static,
    {
        let method = method.into();
        let mut handlers = self.handlers.write().unwrap_or_else(PoisonError::into_inner);
        if handlers.contains_key(&method) {
            return Err(KaraError::HandlerExists(method));
        }
        tracing::debug!(method = %method, "IPC handler registered");
        handlers.insert(method, Arc::new(handler));
        Ok(())
    }

    pub fn remove_handler(&self, method: &str) -> bool {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(method)
            .is_some()
    }

    pub fn has_handler(&self, method: &str) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(method)
    }

    /// Observe every message sent on `channel`, from any window.
    pub fn on<F>(&self, channel: impl Into<String>, listener: F)
    where
        F: Fn(&IpcEvent) + Send + Sync + 'static,
    {
        self.listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Invokes sent to windows that are still waiting for a reply.
    pub fn pending_replies(&self) -> usize {
        self.pending().len()
    }

    pub(crate) fn expect_reply(
        &self,
        window: &WindowId,
        channel: &str,
        correlation_id: &str,
    ) -> oneshot::Receiver<Vec<Value>> {
        self.pending().insert(window, channel, correlation_id)
    }

    pub(crate) fn cancel_reply(&self, window: &WindowId, correlation_id: &str) {
        self.pending().cancel(window, correlation_id);
    }

    pub(crate) fn drop_replies_for(&self, window: &WindowId) {
        let dropped = self.pending().drop_window(window);
        if dropped > 0 {
            tracing::debug!(window = %window, dropped, "Abandoned pending invokes");
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingReplies> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify_listeners(&self, window: &WindowId, message: &ApplicationMessage) -> bool {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.channel)
            .cloned()
            .unwrap_or_default();
        if listeners.is_empty() {
            return false;
        }
        let event = IpcEvent {
            window_id: window.clone(),
            channel: message.channel.clone(),
            args: message.args.clone(),
        };
        for listener in &listeners {
            listener(&event);
        }
        true
    }
}

impl InboundRouter for Dispatcher {
    fn route(&self, ctx: CallContext, message: ApplicationMessage) {
        let is_reply = self.pending().resolve(&ctx.window_id, &message);
        let observed = self.notify_listeners(&ctx.window_id, &message);
        if is_reply {
            return;
        }

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.channel)
            .cloned();
        match handler {
            Some(handler) => spawn_invoke(handler, ctx, message),
            None if !observed => {
                tracing::debug!(
                    window = %ctx.window_id,
                    channel = %message.channel,
                    "No handler or listener for channel"
                );
            }
            None => {}
        }
    }
}

/// Run a handler off the connection task and send its outcome back.
/// The handler runs in its own task so a panic turns into an error reply
/// instead of a reply that never comes.
fn spawn_invoke(handler: Arc<dyn InvokeHandler>, ctx: CallContext, message: ApplicationMessage) {
    let ApplicationMessage { channel, args } = message;
    let mut args = args.into_iter();
    let correlation = args.next().unwrap_or(Value::Null);
    let request = IpcRequest {
        window_id: ctx.window_id.clone(),
        method: channel.clone(),
        args: args.collect(),
    };

    tokio::spawn(async move {
        let outcome = tokio::spawn(async move { handler.call(request).await }).await;
        let (error, result) = match outcome {
            Ok(Ok(value)) => (Value::Null, value),
            Ok(Err(e)) => {
                tracing::debug!(method = %channel, error = %e, "IPC handler failed");
                (Value::from(e.to_string()), Value::Null)
            }
            Err(join) => {
                tracing::error!(method = %channel, error = %join, "IPC handler panicked");
                (Value::from(format!("handler for `{channel}` panicked")), Value::Null)
            }
        };

        let reply = ApplicationMessage::new(channel, vec![correlation, error, result]);
        if !ctx.reply(&reply) {
            tracing::debug!(window = %ctx.window_id, "Caller gone before reply was sent");
        }
    });
}
