use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use kara_common::{
    ApplicationMessage, FrameKind, InboundFrame, KaraError, OutboundFrame, SystemCall, WindowId,
};
use kara_config::TransportConfig;
use serde_json::json;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::*;
use crate::token::Token;

type Peer = WebSocketStream<MaybeTlsStream<TcpStream>>;

const QUIET: Duration = Duration::from_millis(150);
const WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
enum Hook {
    Open(&'static str),
    Close(&'static str),
}

struct Recorder {
    tx: mpsc::UnboundedSender<(WindowId, ApplicationMessage)>,
}

impl InboundRouter for Recorder {
    fn route(&self, ctx: CallContext, message: ApplicationMessage) {
        let _ = self.tx.send((ctx.window_id, message));
    }
}

struct Echo;

impl InboundRouter for Echo {
    fn route(&self, ctx: CallContext, message: ApplicationMessage) {
        ctx.reply(&ApplicationMessage::new("echo", message.args));
    }
}

async fn start_hub(
    grace_ms: u64,
) -> (Hub, u16, mpsc::UnboundedReceiver<(WindowId, ApplicationMessage)>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let config = TransportConfig {
        grace_period_ms: grace_ms,
        ..Default::default()
    };
    let hub = Hub::new(config, Arc::new(Recorder { tx }));
    let port = hub.start().await.unwrap();
    (hub, port, rx)
}

fn register(
    hub: &Hub,
    id: &'static str,
    hooks: &mpsc::UnboundedSender<Hook>,
) -> Token {
    let open = hooks.clone();
    let close = hooks.clone();
    hub.register(
        &WindowId::from(id),
        move || {
            let _ = open.send(Hook::Open(id));
        },
        move || {
            let _ = close.send(Hook::Close(id));
        },
    )
}

async fn connect(port: u16) -> Peer {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}"))
        .await
        .unwrap();
    ws
}

async fn send_raw(peer: &mut Peer, raw: String) {
    peer.send(Message::Text(raw.into())).await.unwrap();
}

async fn send_registration(peer: &mut Peer, id: &str, token: &str) {
    send_raw(peer, InboundFrame::registration(id, token).to_json()).await;
}

async fn send_app(peer: &mut Peer, id: &str, token: &str, channel: &str) {
    let msg = ApplicationMessage::new(channel, vec![json!("cid"), json!(1)]);
    send_raw(peer, InboundFrame::application(id, token, &msg).to_json()).await;
}

async fn next_hook(rx: &mut mpsc::UnboundedReceiver<Hook>) -> Hook {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for hook")
        .expect("hook channel closed")
}

async fn assert_quiet<T: std::fmt::Debug>(rx: &mut mpsc::UnboundedReceiver<T>, within: Duration) {
    if let Ok(Some(item)) = tokio::time::timeout(within, rx.recv()).await {
        panic!("unexpected item: {item:?}");
    }
}

async fn next_text(peer: &mut Peer) -> String {
    loop {
        let frame = tokio::time::timeout(WAIT, peer.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .expect("socket error");
        if let Message::Text(text) = frame {
            return text.as_str().to_string();
        }
    }
}

#[tokio::test]
async fn start_binds_ephemeral_port_once() {
    let (hub, port, _rx) = start_hub(200).await;
    assert_ne!(port, 0);
    assert_eq!(hub.port(), Some(port));
    assert!(matches!(hub.start().await, Err(KaraError::AlreadyStarted)));
    hub.shutdown().await;
}

#[tokio::test]
async fn bind_failure_is_reported() {
    let (first, port, _rx) = start_hub(200).await;
    let config = TransportConfig {
        port,
        ..Default::default()
    };
    let second = Hub::new(config, Arc::new(Echo));
    assert!(matches!(second.start().await, Err(KaraError::Bind { .. })));
    first.shutdown().await;
}

#[tokio::test]
async fn registration_binds_and_fires_on_open() {
    let (hub, port, _rx) = start_hub(200).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w1", token.as_str()).await;

    assert_eq!(next_hook(&mut hook_rx).await, Hook::Open("w1"));
    assert!(hub.connection(&WindowId::from("w1")).is_some());
    assert_eq!(hub.connection_count(), 1);
    hub.shutdown().await;
}

#[tokio::test]
async fn wrong_token_is_dropped_silently() {
    let (hub, port, mut routed) = start_hub(200).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w1", "not-the-token").await;
    send_app(&mut peer, "w1", "not-the-token", "ping").await;

    assert_quiet(&mut hook_rx, QUIET).await;
    assert_quiet(&mut routed, Duration::ZERO).await;
    assert!(hub.connection(&WindowId::from("w1")).is_none());

    // The socket stays usable after rejected frames.
    send_registration(&mut peer, "w1", token.as_str()).await;
    assert_eq!(next_hook(&mut hook_rx).await, Hook::Open("w1"));
    hub.shutdown().await;
}

#[tokio::test]
async fn wrong_token_on_bound_connection_is_dropped() {
    let (hub, port, mut routed) = start_hub(200).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w1", token.as_str()).await;
    assert_eq!(next_hook(&mut hook_rx).await, Hook::Open("w1"));

    send_app(&mut peer, "w1", "WRONG", "forged").await;
    send_registration(&mut peer, "w1", "WRONG").await;
    send_app(&mut peer, "w1", token.as_str(), "genuine").await;

    // Frames are handled in order, so the forged one would have come first.
    let (window, message) = tokio::time::timeout(WAIT, routed.recv()).await.unwrap().unwrap();
    assert_eq!(window, WindowId::from("w1"));
    assert_eq!(message.channel, "genuine");
    assert_quiet(&mut routed, QUIET).await;
    assert_quiet(&mut hook_rx, Duration::ZERO).await;
    assert!(hub.connection(&WindowId::from("w1")).is_some());
    hub.shutdown().await;
}

#[tokio::test]
async fn registration_for_unknown_identity_is_dropped() {
    let (hub, port, _rx) = start_hub(200).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();

    let mut peer = connect(port).await;
    send_registration(&mut peer, "ghost", "whatever").await;
    tokio::time::sleep(QUIET).await;

    // A record created afterwards does not retroactively accept the frame.
    register(&hub, "ghost", &hooks);
    assert_quiet(&mut hook_rx, QUIET).await;
    assert!(hub.connection(&WindowId::from("ghost")).is_none());
    hub.shutdown().await;
}

#[tokio::test]
async fn malformed_frames_are_ignored() {
    let (hub, port, mut routed) = start_hub(200).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_raw(&mut peer, "{not json".into()).await;
    send_raw(&mut peer, json!({"token": token.as_str(), "body": "_WS_REG_"}).to_string()).await;
    send_raw(&mut peer, json!({"id": "w1", "token": token.as_str(), "body": 7}).to_string()).await;
    send_raw(&mut peer, json!({"id": "w1", "token": token.as_str()}).to_string()).await;
    assert_quiet(&mut hook_rx, QUIET).await;

    send_registration(&mut peer, "w1", token.as_str()).await;
    assert_eq!(next_hook(&mut hook_rx).await, Hook::Open("w1"));

    // A bound connection with a body that is not an application message.
    send_raw(&mut peer, json!({"id": "w1", "token": token.as_str(), "body": "42"}).to_string()).await;
    assert_quiet(&mut routed, QUIET).await;
    hub.shutdown().await;
}

#[tokio::test]
async fn application_frames_need_a_bound_connection() {
    let (hub, port, mut routed) = start_hub(200).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_app(&mut peer, "w1", token.as_str(), "early").await;
    assert_quiet(&mut routed, QUIET).await;

    send_registration(&mut peer, "w1", token.as_str()).await;
    next_hook(&mut hook_rx).await;
    send_app(&mut peer, "w1", token.as_str(), "later").await;

    let (window, message) = tokio::time::timeout(WAIT, routed.recv()).await.unwrap().unwrap();
    assert_eq!(window, WindowId::from("w1"));
    assert_eq!(message.channel, "later");
    assert_eq!(message.args, vec![json!("cid"), json!(1)]);
    hub.shutdown().await;
}

#[tokio::test]
async fn tokens_do_not_cross_identities() {
    let (hub, port, mut routed) = start_hub(200).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let t1 = register(&hub, "w1", &hooks);
    let t2 = register(&hub, "w2", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w2", t1.as_str()).await;
    assert_quiet(&mut hook_rx, QUIET).await;

    send_registration(&mut peer, "w1", t1.as_str()).await;
    assert_eq!(next_hook(&mut hook_rx).await, Hook::Open("w1"));

    // Correct token for w2, but this socket already speaks for w1.
    send_registration(&mut peer, "w2", t2.as_str()).await;
    send_app(&mut peer, "w2", t2.as_str(), "spoof").await;
    assert_quiet(&mut hook_rx, QUIET).await;
    assert_quiet(&mut routed, Duration::ZERO).await;
    assert!(hub.connection(&WindowId::from("w2")).is_none());
    hub.shutdown().await;
}

#[tokio::test]
async fn send_without_connection_is_a_no_op() {
    let (hub, _port, _rx) = start_hub(200).await;
    let (hooks, _hook_rx) = mpsc::unbounded_channel();
    register(&hub, "w1", &hooks);

    assert!(!hub.send(&WindowId::from("w1"), SystemCall::Stop));
    assert!(!hub.send(&WindowId::from("nobody"), SystemCall::Stop));
    hub.shutdown().await;
}

#[tokio::test]
async fn send_delivers_tagged_frames_with_window_token() {
    let (hub, port, _rx) = start_hub(200).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w1", token.as_str()).await;
    next_hook(&mut hook_rx).await;

    let id = WindowId::from("w1");
    assert!(hub.send(&id, SystemCall::SetTitle { title: "Hi".into() }));
    assert!(hub.send(&id, ApplicationMessage::new("news", vec![json!(42)])));

    let frame = OutboundFrame::parse(&next_text(&mut peer).await).unwrap();
    assert_eq!(frame.kind, FrameKind::System);
    assert!(token.matches(&frame.token));
    assert_eq!(
        serde_json::from_str::<serde_json::Value>(&frame.body).unwrap(),
        json!({"method": "setTitle", "args": ["Hi"]})
    );

    let frame = OutboundFrame::parse(&next_text(&mut peer).await).unwrap();
    assert_eq!(frame.kind, FrameKind::Application);
    let message = ApplicationMessage::parse(&frame.body).unwrap();
    assert_eq!(message, ApplicationMessage::new("news", vec![json!(42)]));
    hub.shutdown().await;
}

#[tokio::test]
async fn router_replies_on_same_connection() {
    let hub = Hub::new(TransportConfig::default(), Arc::new(Echo));
    let port = hub.start().await.unwrap();
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w1", token.as_str()).await;
    next_hook(&mut hook_rx).await;
    send_app(&mut peer, "w1", token.as_str(), "anything").await;

    let frame = OutboundFrame::parse(&next_text(&mut peer).await).unwrap();
    let message = ApplicationMessage::parse(&frame.body).unwrap();
    assert_eq!(message.channel, "echo");
    assert_eq!(message.args, vec![json!("cid"), json!(1)]);
    hub.shutdown().await;
}

#[tokio::test]
async fn reconnect_within_grace_keeps_window_open() {
    let (hub, port, _rx) = start_hub(1_000).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut first = connect(port).await;
    send_registration(&mut first, "w1", token.as_str()).await;
    assert_eq!(next_hook(&mut hook_rx).await, Hook::Open("w1"));
    first.close(None).await.unwrap();
    drop(first);

    let mut second = connect(port).await;
    send_registration(&mut second, "w1", token.as_str()).await;
    assert_eq!(next_hook(&mut hook_rx).await, Hook::Open("w1"));

    assert_quiet(&mut hook_rx, Duration::from_millis(1_300)).await;
    assert!(hub.connection(&WindowId::from("w1")).is_some());
    hub.shutdown().await;
}

#[tokio::test]
async fn close_fires_once_after_grace_period() {
    let (hub, port, _rx) = start_hub(50).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w1", token.as_str()).await;
    next_hook(&mut hook_rx).await;
    drop(peer);

    assert_eq!(next_hook(&mut hook_rx).await, Hook::Close("w1"));
    assert_quiet(&mut hook_rx, QUIET).await;
    assert!(hub.connection(&WindowId::from("w1")).is_none());
    hub.shutdown().await;
}

#[tokio::test]
async fn unregister_suppresses_close_and_routing() {
    let (hub, port, mut routed) = start_hub(50).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w1", token.as_str()).await;
    next_hook(&mut hook_rx).await;

    hub.unregister(&WindowId::from("w1"));
    assert!(!hub.is_registered(&WindowId::from("w1")));
    send_app(&mut peer, "w1", token.as_str(), "late").await;
    assert_quiet(&mut routed, QUIET).await;

    drop(peer);
    assert_quiet(&mut hook_rx, Duration::from_millis(300)).await;
    hub.shutdown().await;
}

#[tokio::test]
async fn shutdown_closes_live_connections() {
    let (hub, port, _rx) = start_hub(50).await;
    let (hooks, mut hook_rx) = mpsc::unbounded_channel();
    let token = register(&hub, "w1", &hooks);

    let mut peer = connect(port).await;
    send_registration(&mut peer, "w1", token.as_str()).await;
    next_hook(&mut hook_rx).await;

    tokio::time::timeout(WAIT, hub.shutdown()).await.unwrap();

    let ended = tokio::time::timeout(WAIT, async {
        loop {
            match peer.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await;
    assert!(ended.is_ok());
    assert_eq!(hub.connection_count(), 0);

    // No close callback after shutdown.
    assert_quiet(&mut hook_rx, Duration::from_millis(200)).await;
}
