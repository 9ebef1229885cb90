//! End-to-end: a real `App` driving the `kara-headless` renderer binary.

use std::time::Duration;

use kara_common::AppEvent;
use kara_config::KaraConfig;
use kara_hub::{App, HandlerResult, IpcRequest, WindowState};
use serde_json::json;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(10);

fn config() -> KaraConfig {
    let mut config = KaraConfig::default();
    config.renderer.program = env!("CARGO_BIN_EXE_kara-headless").to_string();
    config
}

async fn wait_for(rx: &mut broadcast::Receiver<AppEvent>, expected: &AppEvent) {
    tokio::time::timeout(WAIT, async {
        loop {
            if rx.recv().await.unwrap() == *expected {
                return;
            }
        }
    })
    .await
    .expect("event never arrived");
}

#[tokio::test]
async fn window_becomes_ready_then_closes() {
    let app = App::launch(config()).await.unwrap();
    let mut events = app.subscribe();
    let window = app.create_window().unwrap();

    tokio::time::timeout(WAIT, window.when_ready())
        .await
        .unwrap()
        .unwrap();
    wait_for(&mut events, &AppEvent::WindowReady(window.id().clone())).await;
    window.set_title("Kara");
    window.set_size(640, 480);
    let echoed = tokio::time::timeout(WAIT, window.invoke("echo", vec![json!("still here")]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(echoed, json!("still here"));

    window.close().await;

    assert_eq!(window.state(), WindowState::Closed);
    wait_for(&mut events, &AppEvent::WindowClosed(window.id().clone())).await;
    wait_for(&mut events, &AppEvent::AllWindowsClosed).await;
    assert_eq!(app.window_count(), 0);
    app.quit().await;
}

#[tokio::test]
async fn navigation_reconnects_without_closing() {
    let app = App::launch(config()).await.unwrap();
    let mut events = app.subscribe();
    let window = app.create_window().unwrap();

    tokio::time::timeout(WAIT, window.load_url("https://example.com/"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(window.url().await.unwrap(), "https://example.com/");

    window.reload();
    tokio::time::timeout(WAIT, window.when_ready())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(window.url().await.unwrap(), "https://example.com/");

    // Outlive the grace period: the reconnects must not have closed anything.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(window.state(), WindowState::Ready);
    while let Ok(event) = events.try_recv() {
        assert_ne!(event, AppEvent::WindowClosed(window.id().clone()));
    }
    app.quit().await;
}

#[tokio::test]
async fn hub_invokes_renderer_handler() {
    let app = App::launch(config()).await.unwrap();
    let window = app.create_window().unwrap();
    tokio::time::timeout(WAIT, window.when_ready())
        .await
        .unwrap()
        .unwrap();

    let value = tokio::time::timeout(WAIT, window.invoke("echo", vec![json!({"n": 1})]))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(value, json!({"n": 1}));
    app.quit().await;
}

#[tokio::test]
async fn quit_stops_every_renderer() {
    let app = App::launch(config()).await.unwrap();
    let mut events = app.subscribe();
    let first = app.create_window().unwrap();
    let second = app.create_window().unwrap();
    for window in [&first, &second] {
        tokio::time::timeout(WAIT, window.when_ready())
            .await
            .unwrap()
            .unwrap();
    }
    assert_eq!(app.window_count(), 2);

    tokio::time::timeout(WAIT, app.quit()).await.unwrap();

    assert_eq!(first.state(), WindowState::Closed);
    assert_eq!(second.state(), WindowState::Closed);
    wait_for(&mut events, &AppEvent::AllWindowsClosed).await;
    wait_for(&mut events, &AppEvent::Shutdown).await;
}

#[tokio::test]
async fn ping_handler_is_reachable_from_app() {
    let app = App::new(config());
    app.ipc()
        .handle("ping", |_req: IpcRequest| async {
            HandlerResult::Ok(json!("world!"))
        })
        .unwrap();
    app.start().await.unwrap();
    assert!(app.ipc().has_handler("ping"));
    app.quit().await;
}
