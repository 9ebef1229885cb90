//! Window lifecycle controller.
//!
//! A [`Window`] owns one renderer process and its listener record on the
//! hub. It turns registrations into readiness, sends system calls, runs
//! invokes against renderer-side handlers, and closes itself when the
//! renderer exits or stays disconnected past the grace period.

mod process;
mod state;


use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use kara_common::env;
use kara_common::protocol::GET_URL_CHANNEL;
use kara_common::{
    new_correlation_id, AppEvent, ApplicationMessage, EventBus, KaraError, SystemCall, WindowId,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::app::App;
use crate::ipc::Dispatcher;
use crate::lifecycle::{Lifecycle, LiveWindow};
use crate::transport::{Hub, OutboundBody};

use process::RendererProcess;
pub use state::WindowState;

/// Per-window overrides of the renderer defaults.
#[derive(Debug, Clone, Default)]
pub struct WindowOptions {
    /// Debug flag passed to the renderer; falls back to `renderer.debug`.
    pub debug: Option<bool>,
}

/// Handle to a live window. Clones refer to the same window.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

pub(crate) struct WindowInner {
    id: WindowId,
    hub: Hub,
    ipc: Arc<Dispatcher>,
    lifecycle: Arc<Lifecycle>,
    bus: Arc<EventBus>,
    state: Arc<watch::Sender<WindowState>>,
    process: RendererProcess,
    invoke_timeout: Option<Duration>,
}

impl Window {
    /// Register a new identity with the hub and launch its renderer.
    pub(crate) fn spawn(app: &App, options: WindowOptions) -> Result<Self, KaraError> {
        let hub = app.hub().clone();
        let port = hub.port().ok_or(KaraError::HubNotStarted)?;
        let config = app.config();
        let id = WindowId::new();
        let state = Arc::new(watch::channel(WindowState::Created).0);
        let (close_tx, close_rx) = mpsc::unbounded_channel::<()>();

        let token = {
            let state = Arc::clone(&state);
            let bus = app.bus();
            let ready_id = id.clone();
            hub.register(
                &id,
                move || {
                    if advance(&state, WindowState::on_registered) {
                        tracing::info!(window = %ready_id, "Window ready");
                        bus.publish(AppEvent::WindowReady(ready_id.clone()));
                    }
                },
                move || {
                    let _ = close_tx.send(());
                },
            )
        };

        let debug = options.debug.unwrap_or(config.renderer.debug);
        let vars = [
            (env::WINDOW_ID, id.to_string()),
            (env::TRANSPORT_HOST, config.transport.host.clone()),
            (env::TRANSPORT_PORT, port.to_string()),
            (env::TRANSPORT_TOKEN, token.as_str().to_string()),
            (env::DEBUG, env::debug_flag(debug).to_string()),
            (env::LOADER, config.renderer.loader.clone()),
        ];
        let (process, exit_rx) = match process::spawn(&id, &config.renderer, &vars) {
            Ok(spawned) => spawned,
            Err(e) => {
                hub.unregister(&id);
                return Err(e);
            }
        };
        advance(&state, WindowState::on_spawned);

        let inner = Arc::new(WindowInner {
            id: id.clone(),
            hub,
            ipc: app.ipc(),
            lifecycle: app.lifecycle(),
            bus: app.bus(),
            state,
            process,
            invoke_timeout: config.ipc.invoke_timeout(),
        });

        let weak: Weak<WindowInner> = Arc::downgrade(&inner);
        inner.lifecycle.window_opened(&id, weak);
        tokio::spawn(supervise(Arc::clone(&inner), close_rx, exit_rx));

        Ok(Self { inner })
    }

    pub fn id(&self) -> &WindowId {
        &self.inner.id
    }

    pub fn state(&self) -> WindowState {
        *self.inner.state.borrow()
    }

    /// Whether the renderer is registered and not navigating.
    pub fn is_ready(&self) -> bool {
        self.state().is_ready()
    }

    /// Renderer process id, if the platform reported one.
    pub fn pid(&self) -> Option<u32> {
        self.inner.process.pid()
    }

    /// Wait until the window is ready. Fails if it closes first.
    pub async fn when_ready(&self) -> Result<(), KaraError> {
        let mut rx = self.inner.state.subscribe();
        let state = *rx
            .wait_for(|s| s.is_ready() || s.is_terminal())
            .await
            .map_err(|_| KaraError::WindowClosed(self.inner.id.clone()))?;
        if state.is_ready() {
            Ok(())
        } else {
            Err(KaraError::WindowClosed(self.inner.id.clone()))
        }
    }

    /// Wait until the window has fully closed.
    pub async fn closed(&self) {
        let mut rx = self.inner.state.subscribe();
        let _ = rx.wait_for(|s| *s == WindowState::Closed).await;
    }

    pub fn set_title(&self, title: impl Into<String>) {
        self.inner.system_call(SystemCall::SetTitle {
            title: title.into(),
        });
    }

    pub fn set_size(&self, width: u32, height: u32) {
        self.inner.system_call(SystemCall::SetSize { width, height });
    }

    pub fn eval(&self, script: impl Into<String>) {
        self.inner.system_call(SystemCall::Eval {
            script: script.into(),
        });
    }

    /// Point the renderer at a new URL. The window stops being ready until
    /// the new page registers.
    pub fn navigate(&self, url: impl Into<String>) {
        self.inner.page_swap(SystemCall::Navigate { url: url.into() });
    }

    /// Replace the page with inline HTML. Same readiness rules as
    /// [`Window::navigate`].
    pub fn set_html(&self, html: impl Into<String>) {
        self.inner.page_swap(SystemCall::SetHtml { html: html.into() });
    }

    /// Reload the current page by evaluating `location.reload()` in it.
    pub fn reload(&self) {
        self.inner.page_swap(SystemCall::Eval {
            script: "location.reload()".into(),
        });
    }

    /// Navigate and wait for the new page.
    ///
    /// A window whose renderer has not registered yet has no socket to
    /// carry the navigation, so the call first waits for that initial
    /// registration.
    pub async fn load_url(&self, url: impl Into<String>) -> Result<(), KaraError> {
        if self.state() == WindowState::AwaitingConnection {
            self.when_ready().await?;
        }
        self.navigate(url);
        self.when_ready().await
    }

    /// Fire an application message at the renderer. Skipped silently if
    /// it is not connected.
    pub fn send(&self, channel: impl Into<String>, args: Vec<Value>) {
        self.inner
            .send(ApplicationMessage::new(channel, args).into());
    }

    /// Call a renderer-side handler and wait for its result.
    ///
    /// The request is lost if the renderer is not connected when it is
    /// sent; with no `ipc.invoke_timeout_ms` configured the call then
    /// waits until the window closes.
    pub async fn invoke(&self, channel: &str, args: Vec<Value>) -> Result<Value, KaraError> {
        let mut reply = self.inner.request(channel, args).await?.into_iter();
        let error = reply.next().unwrap_or(Value::Null);
        let result = reply.next().unwrap_or(Value::Null);
        if error.is_null() {
            Ok(result)
        } else {
            Err(KaraError::Remote(match error {
                Value::String(message) => message,
                other => other.to_string(),
            }))
        }
    }

    /// The renderer's current location.
    pub async fn url(&self) -> Result<String, KaraError> {
        let reply = self.inner.request(GET_URL_CHANNEL, Vec::new()).await?;
        Ok(reply
            .first()
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Stop and kill the renderer, drop the listener record and report the
    /// window closed. Safe to call more than once.
    pub async fn close(&self) {
        self.inner.close().await;
    }
}

impl std::fmt::Debug for Window {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.inner.id)
            .field("state", &self.state())
            .field("pid", &self.pid())
            .finish()
    }
}

impl WindowInner {
    fn system_call(&self, call: SystemCall) {
        tracing::debug!(window = %self.id, method = call.method(), "System call");
        self.send(call.into());
    }

    /// Send a call that replaces the page. Every call goes out, even while
    /// an earlier one is still in flight; only a closing window refuses.
    fn page_swap(&self, call: SystemCall) {
        if self.state.borrow().is_terminal() {
            tracing::debug!(window = %self.id, method = call.method(), "Window closing, call dropped");
            return;
        }
        advance(&self.state, WindowState::on_navigate);
        self.system_call(call);
    }

    fn send(&self, body: OutboundBody) {
        self.hub.send(&self.id, body);
    }

    async fn request(&self, channel: &str, args: Vec<Value>) -> Result<Vec<Value>, KaraError> {
        if self.state.borrow().is_terminal() {
            return Err(KaraError::WindowClosed(self.id.clone()));
        }

        let correlation = new_correlation_id();
        let reply = self.ipc.expect_reply(&self.id, channel, &correlation);
        let mut payload = Vec::with_capacity(args.len() + 1);
        payload.push(Value::from(correlation.as_str()));
        payload.extend(args);
        self.send(ApplicationMessage::new(channel, payload).into());

        let outcome = match self.invoke_timeout {
            Some(after) => match tokio::time::timeout(after, reply).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.ipc.cancel_reply(&self.id, &correlation);
                    return Err(KaraError::InvokeTimeout {
                        channel: channel.to_string(),
                        after,
                    });
                }
            },
            None => reply.await,
        };
        outcome.map_err(|_: oneshot::error::RecvError| KaraError::WindowClosed(self.id.clone()))
    }

    async fn close(&self) {
        if !advance(&self.state, WindowState::on_close_requested) {
            return;
        }
        tracing::info!(window = %self.id, "Closing window");

        self.system_call(SystemCall::Stop);
        self.process.terminate().await;
        self.hub.unregister(&self.id);
        self.ipc.drop_replies_for(&self.id);

        self.state.send_replace(WindowState::Closed);
        self.bus.publish(AppEvent::WindowClosed(self.id.clone()));
        self.lifecycle.window_closed(&self.id);
    }
}

#[async_trait]
impl LiveWindow for WindowInner {
    async fn close(&self) {
        WindowInner::close(self).await;
    }
}

/// Close the window when its renderer stays disconnected past the grace
/// period or its process exits.
async fn supervise(
    window: Arc<WindowInner>,
    mut close_rx: mpsc::UnboundedReceiver<()>,
    exit_rx: oneshot::Receiver<Option<std::process::ExitStatus>>,
) {
    tokio::select! {
        Some(()) = close_rx.recv() => {
            tracing::debug!(window = %window.id, "Renderer did not reconnect");
        }
        status = exit_rx => {
            let status = status.ok().flatten();
            tracing::debug!(window = %window.id, status = ?status, "Renderer process ended");
        }
    }
    window.close().await;
}

/// Apply a state transition. Returns whether the state changed.
fn advance(
    state: &watch::Sender<WindowState>,
    transition: impl FnOnce(WindowState) -> Option<WindowState>,
) -> bool {
    state.send_if_modified(|current| match transition(*current) {
        Some(next) if next != *current => {
            *current = next;
            true
        }
        _ => false,
    })
}
