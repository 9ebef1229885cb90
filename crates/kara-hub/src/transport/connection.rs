//! Per-connection task: read frames, authenticate, forward outbound queue.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use kara_common::{ApplicationMessage, InboundFrame, OutboundFrame, WindowId, REGISTRATION_LITERAL};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use super::hub::HubInner;
use super::CallContext;

/// Cheap handle to one accepted socket. Sends are queued and written by
/// the connection's own task, so they never block the caller.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: u64,
    peer: SocketAddr,
    tx: mpsc::UnboundedSender<Message>,
}

impl ConnectionHandle {
    pub(super) fn new(id: u64, peer: SocketAddr, tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { id, peer, tx }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_open(&self) -> bool {
        !self.tx.is_closed()
    }

    pub(crate) fn send_frame(&self, frame: &OutboundFrame) -> bool {
        self.tx.send(Message::Text(frame.to_json().into())).is_ok()
    }
}

/// Drive one WebSocket connection until the peer leaves or the hub stops.
pub(super) async fn serve_connection(
    hub: Arc<HubInner>,
    ws: WebSocketStream<TcpStream>,
    peer: SocketAddr,
) {
    let (mut sink, mut stream) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();
    let handle = ConnectionHandle::new(hub.next_connection_id(), peer, tx);
    let mut bound: Option<WindowId> = None;

    tracing::debug!(peer = %peer, connection = handle.id, "Connection accepted");

    let stopped = loop {
        tokio::select! {
            _ = hub.cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break true;
            }

            Some(msg) = rx.recv() => {
                if sink.send(msg).await.is_err() {
                    break false;
                }
            }

            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        handle_frame(&hub, &handle, &mut bound, text.as_str());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break false,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %peer, error = %e, "WS error");
                        break false;
                    }
                    _ => {}
                }
            }
        }
    };

    tracing::debug!(
        peer = %peer,
        connection = handle.id,
        window = ?bound.as_ref().map(WindowId::as_str),
        "Connection closed"
    );

    if !stopped {
        if let Some(id) = bound {
            hub.connection_closed(&id, handle.id);
        }
    }
}

/// Authenticate one text frame and act on it.
///
/// Every rejection path logs the same line at trace level and sends
/// nothing back.
fn handle_frame(
    hub: &Arc<HubInner>,
    conn: &ConnectionHandle,
    bound: &mut Option<WindowId>,
    raw: &str,
) {
    let Some(InboundFrame { id, token, body }) = InboundFrame::parse(raw) else {
        return rejected(conn);
    };
    let id = WindowId::from(id);

    let (record_token, on_open) = {
        let state = hub.state();
        let Some(record) = state.listeners.get(&id) else {
            return rejected(conn);
        };
        if !token.as_deref().is_some_and(|t| record.token.matches(t)) {
            return rejected(conn);
        }
        (record.token.clone(), Arc::clone(&record.on_open))
    };
    let Some(body) = body else {
        return rejected(conn);
    };

    if body == REGISTRATION_LITERAL {
        // A socket speaks for one identity for its whole life.
        if bound.as_ref().is_some_and(|current| *current != id) {
            return rejected(conn);
        }
        hub.bind(&id, conn);
        tracing::debug!(window = %id, connection = conn.id, "Window registered");
        *bound = Some(id);
        on_open();
        return;
    }

    if bound.as_ref() != Some(&id) {
        return rejected(conn);
    }
    let Some(message) = ApplicationMessage::parse(&body) else {
        return rejected(conn);
    };

    hub.router.route(
        CallContext {
            window_id: id,
            token: record_token,
            connection: conn.clone(),
        },
        message,
    );
}

fn rejected(conn: &ConnectionHandle) {
    tracing::trace!(peer = %conn.peer, connection = conn.id, "Frame dropped");
}

#[cfg(test)]
impl ConnectionHandle {
    /// A handle with no socket behind it. Queued frames land in the
    /// returned receiver.
    pub(crate) fn detached() -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let peer = SocketAddr::from(([127, 0, 0, 1], 0));
        (Self::new(0, peer, tx), rx)
    }
}
