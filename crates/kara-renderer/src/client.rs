//! WebSocket client a renderer process uses to talk to the hub.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use kara_common::protocol::GET_URL_CHANNEL;
use kara_common::{
    new_correlation_id, ApplicationMessage, FrameKind, InboundFrame, OutboundFrame, SystemCall,
    SystemMessage, WindowId,
};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;

use crate::env::RendererEnv;
use crate::error::RendererError;
use crate::pending::PendingInvokes;

type Listener = Arc<dyn Fn(&[Value]) + Send + Sync>;
type Handler = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// A registered connection to the hub.
///
/// Dropping the client closes the socket; outstanding invokes then fail
/// with [`RendererError::Closed`].
pub struct RendererClient {
    shared: Arc<Shared>,
    outbound: mpsc::UnboundedSender<Message>,
}

struct Shared {
    id: WindowId,
    token: String,
    connected: AtomicBool,
    location: Mutex<String>,
    pending: Mutex<PendingInvokes>,
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    handlers: RwLock<HashMap<String, Handler>>,
}

impl RendererClient {
    /// Connect to the hub and register. System calls addressed to this
    /// window arrive on the returned receiver, which ends when the
    /// connection does.
    pub async fn connect(
        env: &RendererEnv,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SystemCall>), RendererError> {
        let url = env.url();
        let (ws, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|source| RendererError::Connect {
                url: url.clone(),
                source,
            })?;
        let (mut sink, mut stream) = ws.split();

        let registration = InboundFrame::registration(env.id.as_str(), env.token.as_str());
        sink.send(Message::Text(registration.to_json().into()))
            .await
            .map_err(|source| RendererError::Connect { url, source })?;

        let shared = Arc::new(Shared::new(env));
        let (outbound, mut outbound_rx) = mpsc::unbounded_channel::<Message>();
        let (calls_tx, calls_rx) = mpsc::unbounded_channel();
        tracing::debug!(window = %env.id, "Registered with hub");

        let task_shared = Arc::clone(&shared);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    msg = outbound_rx.recv() => match msg {
                        Some(msg) => {
                            if sink.send(msg).await.is_err() {
                                break;
                            }
                        }
                        None => {
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        }
                    },

                    frame = stream.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            if let Some(reply) = task_shared.handle_frame(text.as_str(), &calls_tx) {
                                if sink.send(Message::Text(reply.into())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(Message::Ping(data))) => {
                            let _ = sink.send(Message::Pong(data)).await;
                        }
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => {
                            tracing::debug!(error = %e, "WS error");
                            break;
                        }
                        _ => {}
                    },
                }
            }
            task_shared.disconnected();
        });

        Ok((Self { shared, outbound }, calls_rx))
    }

    pub fn id(&self) -> &WindowId {
        &self.shared.id
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::Acquire)
    }

    /// Send an application message to the hub.
    pub fn send(&self, channel: impl Into<String>, args: Vec<Value>) -> Result<(), RendererError> {
        let message = ApplicationMessage::new(channel, args);
        let frame = self.shared.frame(&message);
        self.outbound
            .send(Message::Text(frame.into()))
            .map_err(|_| RendererError::Closed)
    }

    /// Observe every application message the hub sends on `channel`.
    pub fn on<F>(&self, channel: impl Into<String>, listener: F)
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.shared
            .listeners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(channel.into())
            .or_default()
            .push(Arc::new(listener));
    }

    /// Answer hub-side invokes on `method`. The handler gets the arguments
    /// after the correlation id.
    pub fn handle<F>(&self, method: impl Into<String>, handler: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(method.into(), Arc::new(handler));
    }

    /// Call a hub handler and wait for its reply, however long it takes.
    pub async fn invoke(&self, method: &str, args: Vec<Value>) -> Result<Value, RendererError> {
        let (_, reply) = self.begin_invoke(method, args)?;
        finish_invoke(reply.await)
    }

    /// Like [`RendererClient::invoke`], giving up after `after`.
    pub async fn invoke_with_timeout(
        &self,
        method: &str,
        args: Vec<Value>,
        after: Duration,
    ) -> Result<Value, RendererError> {
        let (cid, reply) = self.begin_invoke(method, args)?;
        match tokio::time::timeout(after, reply).await {
            Ok(reply) => finish_invoke(reply),
            Err(_) => {
                self.shared.pending().remove(&cid);
                Err(RendererError::Timeout {
                    method: method.to_string(),
                    after,
                })
            }
        }
    }

    /// Invokes still waiting for a reply.
    pub fn pending_invokes(&self) -> usize {
        self.shared.pending().len()
    }

    /// Location reported to the hub when it asks for this window's URL.
    pub fn set_location(&self, href: impl Into<String>) {
        *self
            .shared
            .location
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = href.into();
    }

    pub fn location(&self) -> String {
        self.shared
            .location
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Close the socket.
    pub fn close(self) {
        let _ = self.outbound.send(Message::Close(None));
    }

    fn begin_invoke(
        &self,
        method: &str,
        args: Vec<Value>,
    ) -> Result<(String, oneshot::Receiver<Vec<Value>>), RendererError> {
        if !self.is_connected() {
            return Err(RendererError::Closed);
        }
        let cid = new_correlation_id();
        let reply = self.shared.pending().insert(&cid, method);

        let mut payload = Vec::with_capacity(args.len() + 1);
        payload.push(Value::from(cid.as_str()));
        payload.extend(args);
        if let Err(e) = self.send(method, payload) {
            self.shared.pending().remove(&cid);
            return Err(e);
        }
        Ok((cid, reply))
    }
}

fn finish_invoke(
    reply: Result<Vec<Value>, oneshot::error::RecvError>,
) -> Result<Value, RendererError> {
    let mut reply = reply.map_err(|_| RendererError::Closed)?.into_iter();
    let error = reply.next().unwrap_or(Value::Null);
    let result = reply.next().unwrap_or(Value::Null);
    if error.is_null() {
        Ok(result)
    } else {
        Err(RendererError::Remote(error))
    }
}

impl std::fmt::Debug for RendererClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RendererClient")
            .field("id", &self.shared.id)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn new(env: &RendererEnv) -> Self {
        Self {
            id: env.id.clone(),
            token: env.token.clone(),
            connected: AtomicBool::new(true),
            location: Mutex::new("about:blank".into()),
            pending: Mutex::new(PendingInvokes::default()),
            listeners: RwLock::new(HashMap::new()),
            handlers: RwLock::new(HashMap::new()),
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingInvokes> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn frame(&self, message: &ApplicationMessage) -> String {
        InboundFrame::application(self.id.as_str(), self.token.as_str(), message).to_json()
    }

    fn disconnected(&self) {
        self.connected.store(false, Ordering::Release);
        self.pending().clear();
        tracing::debug!(window = %self.id, "Disconnected from hub");
    }

    /// Act on one frame from the hub. Returns a frame to send back when
    /// the message was a request this side answers itself.
    fn handle_frame(&self, raw: &str, calls: &mpsc::UnboundedSender<SystemCall>) -> Option<String> {
        let frame = OutboundFrame::parse(raw)?;
        if frame.token != self.token {
            tracing::trace!("Frame with foreign token ignored");
            return None;
        }

        match frame.kind {
            FrameKind::System => {
                let message = SystemMessage::parse(&frame.body)?;
                match SystemCall::from_message(&message) {
                    Some(call) => {
                        let _ = calls.send(call);
                    }
                    None => {
                        tracing::debug!(method = %message.method, "Unsupported system call skipped");
                    }
                }
                None
            }
            FrameKind::Application => {
                let message = ApplicationMessage::parse(&frame.body)?;
                let was_reply = self.pending().resolve(&message);
                self.notify(&message);
                if was_reply {
                    None
                } else {
                    self.answer(&message)
                }
            }
        }
    }

    fn notify(&self, message: &ApplicationMessage) {
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.channel)
            .cloned()
            .unwrap_or_default();
        for listener in listeners {
            listener(message.args.as_slice());
        }
    }

    fn answer(&self, message: &ApplicationMessage) -> Option<String> {
        let cid = message.args.first().cloned().unwrap_or(Value::Null);

        if message.channel == GET_URL_CHANNEL {
            let href = self
                .location
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            let reply = ApplicationMessage::new(GET_URL_CHANNEL, vec![cid, Value::from(href)]);
            return Some(self.frame(&reply));
        }

        let handler = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&message.channel)
            .cloned()?;
        let args = message.args.get(1..).unwrap_or_default();
        let (error, result) = match handler(args) {
            Ok(value) => (Value::Null, value),
            Err(e) => (Value::from(e), Value::Null),
        };
        let reply = ApplicationMessage::new(message.channel.clone(), vec![cid, error, result]);
        Some(self.frame(&reply))
    }
}
