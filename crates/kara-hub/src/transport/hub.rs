use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use kara_common::{KaraError, WindowId};
use kara_config::TransportConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::connection::{serve_connection, ConnectionHandle};
use super::registry::{GraceTimer, HubState, ListenerRecord};
use super::{InboundRouter, OutboundBody};
use crate::token::Token;

/// The transport hub. Clones share one server.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

pub(super) struct HubInner {
    config: TransportConfig,
    pub(super) router: Arc<dyn InboundRouter>,
    state: Mutex<HubState>,
    pub(super) cancel: CancellationToken,
    tracker: TaskTracker,
    next_connection: AtomicU64,
}

impl Hub {
    pub fn new(config: TransportConfig, router: Arc<dyn InboundRouter>) -> Self {
        Self {
            inner: Arc::new(HubInner {
                config,
                router,
                state: Mutex::new(HubState::default()),
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                next_connection: AtomicU64::new(1),
            }),
        }
    }

    /// Bind the listening socket and start accepting connections.
    /// Returns the bound port, which is ephemeral when the configured
    /// port is `0`.
    pub async fn start(&self) -> Result<u16, KaraError> {
        if self.inner.state().port.is_some() {
            return Err(KaraError::AlreadyStarted);
        }

        let addr = self.inner.config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| KaraError::Bind {
                addr: addr.clone(),
                source,
            })?;
        let port = listener
            .local_addr()
            .map_err(|source| KaraError::Bind {
                addr: addr.clone(),
                source,
            })?
            .port();

        {
            let mut state = self.inner.state();
            if state.port.is_some() {
                return Err(KaraError::AlreadyStarted);
            }
            state.port = Some(port);
        }

        tracing::info!(addr = %addr, port, "Transport hub listening");
        self.inner
            .tracker
            .spawn(accept_loop(Arc::clone(&self.inner), listener));
        Ok(port)
    }

    /// The bound port, once started.
    pub fn port(&self) -> Option<u16> {
        self.inner.state().port
    }

    /// Create or replace the listener record for `id` and issue its token.
    ///
    /// Replacing a record revokes the previous token and callbacks. An
    /// existing connection stays bound but future frames must carry the
    /// new token.
    pub fn register<O, C>(&self, id: &WindowId, on_open: O, on_close: C) -> Token
    where
        O: Fn() + Send + Sync + 'static,
        C: Fn() + Send + Sync + 'static,
    {
        let token = Token::issue();
        let record = ListenerRecord {
            token: token.clone(),
            on_open: Arc::new(on_open),
            on_close: Arc::new(on_close),
        };
        let replaced = self
            .inner
            .state()
            .listeners
            .insert(id.clone(), record)
            .is_some();
        if replaced {
            tracing::warn!(window = %id, "Listener replaced, previous token revoked");
        } else {
            tracing::debug!(window = %id, "Listener registered");
        }
        token
    }

    /// Forget the listener record for `id`. Frames for that identity are
    /// dropped from now on and its close callback never runs. A live
    /// connection is left open.
    pub fn unregister(&self, id: &WindowId) {
        let mut state = self.inner.state();
        state.cancel_grace_timer(id);
        if state.listeners.remove(id).is_some() {
            tracing::debug!(window = %id, "Listener unregistered");
        }
    }

    pub fn is_registered(&self, id: &WindowId) -> bool {
        self.inner.state().listeners.contains_key(id)
    }

    /// Queue a frame for the window's live connection. A window with no
    /// record or no live connection is skipped; the return value says
    /// whether the frame was queued.
    pub fn send(&self, id: &WindowId, body: impl Into<OutboundBody>) -> bool {
        let route = self.inner.state().route_for(id);
        let Some((connection, token)) = route else {
            tracing::debug!(window = %id, "No live connection, frame skipped");
            return false;
        };
        let body: OutboundBody = body.into();
        connection.send_frame(&body.to_frame(&token))
    }

    /// The connection currently bound to `id`.
    pub fn connection(&self, id: &WindowId) -> Option<ConnectionHandle> {
        self.inner.state().connections.get(id).cloned()
    }

    pub fn connection_count(&self) -> usize {
        self.inner.state().connections.len()
    }

    /// Stop accepting, close every connection and wait for their tasks.
    /// Pending grace timers are discarded without running close callbacks.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        {
            let mut state = self.inner.state();
            for (_, timer) in state.grace_timers.drain() {
                timer.task.abort();
            }
            state.connections.clear();
        }
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        tracing::info!("Transport hub stopped");
    }
}

impl HubInner {
    pub(super) fn state(&self) -> MutexGuard<'_, HubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(super) fn next_connection_id(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::Relaxed)
    }

    /// Make `conn` the live connection for `id`, cancelling any grace
    /// timer left by a previous connection.
    pub(super) fn bind(&self, id: &WindowId, conn: &ConnectionHandle) {
        let mut state = self.state();
        state.cancel_grace_timer(id);
        if let Some(previous) = state.connections.insert(id.clone(), conn.clone()) {
            if previous.id() != conn.id() {
                tracing::debug!(
                    window = %id,
                    previous = previous.id(),
                    connection = conn.id(),
                    "Binding moved to new connection"
                );
            }
        }
    }

    /// The connection bound to `id` went away. Unless a newer connection
    /// already took over, start the grace timer.
    pub(super) fn connection_closed(self: &Arc<Self>, id: &WindowId, connection_id: u64) {
        let mut state = self.state();
        if state.connections.get(id).map(ConnectionHandle::id) != Some(connection_id) {
            return;
        }
        state.connections.remove(id);
        state.cancel_grace_timer(id);

        let generation = state.next_generation();
        let grace = self.config.grace_period();
        let hub = Arc::clone(self);
        let window = id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            hub.grace_expired(&window, generation);
        });
        state
            .grace_timers
            .insert(id.clone(), GraceTimer { generation, task });

        tracing::debug!(
            window = %id,
            grace_ms = grace.as_millis() as u64,
            "Connection lost, awaiting re-registration"
        );
    }

    fn grace_expired(&self, id: &WindowId, generation: u64) {
        let on_close = {
            let mut state = self.state();
            match state.grace_timers.get(id) {
                Some(timer) if timer.generation == generation => {}
                _ => return,
            }
            state.grace_timers.remove(id);
            if state.connections.contains_key(id) {
                return;
            }
            state.listeners.get(id).map(|record| Arc::clone(&record.on_close))
        };

        if let Some(on_close) = on_close {
            tracing::info!(window = %id, "Grace period elapsed without re-registration");
            on_close();
        }
    }
}

async fn accept_loop(hub: Arc<HubInner>, listener: TcpListener) {
    loop {
        tokio::select! {
            _ = hub.cancel.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => accept_connection(&hub, stream, peer),
                Err(e) => tracing::warn!(error = %e, "TCP accept error"),
            }
        }
    }
    tracing::debug!("Accept loop stopped");
}

fn accept_connection(hub: &Arc<HubInner>, stream: tokio::net::TcpStream, peer: SocketAddr) {
    let conn_hub = Arc::clone(hub);
    hub.tracker.spawn(async move {
        let handshake = tokio::select! {
            _ = conn_hub.cancel.cancelled() => return,
            ws = tokio_tungstenite::accept_async(stream) => ws,
        };
        match handshake {
            Ok(ws) => serve_connection(conn_hub, ws, peer).await,
            Err(e) => tracing::debug!(peer = %peer, error = %e, "WebSocket handshake failed"),
        }
    });
}
