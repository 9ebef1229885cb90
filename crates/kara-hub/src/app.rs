//! Application context: the one object a controlling program holds.

use std::sync::Arc;

use kara_common::{AppEvent, EventBus, KaraError};
use kara_config::KaraConfig;
use tokio::sync::broadcast;

use crate::ipc::Dispatcher;
use crate::lifecycle::Lifecycle;
use crate::transport::Hub;
use crate::window::{Window, WindowOptions};

const EVENT_CAPACITY: usize = 256;

/// Owns the hub, the IPC dispatcher and the lifecycle coordinator.
/// Clones share them.
#[derive(Clone)]
pub struct App {
    inner: Arc<AppInner>,
}

struct AppInner {
    config: KaraConfig,
    hub: Hub,
    ipc: Arc<Dispatcher>,
    lifecycle: Arc<Lifecycle>,
    bus: Arc<EventBus>,
}

impl App {
    /// Build an application that has not started listening yet.
    /// Subscribe and register handlers before calling [`App::start`].
    pub fn new(config: KaraConfig) -> Self {
        let bus = Arc::new(EventBus::new(EVENT_CAPACITY));
        let ipc = Arc::new(Dispatcher::new());
        let hub = Hub::new(config.transport.clone(), ipc.clone());
        let lifecycle = Arc::new(Lifecycle::new(Arc::clone(&bus)));
        Self {
            inner: Arc::new(AppInner {
                config,
                hub,
                ipc,
                lifecycle,
                bus,
            }),
        }
    }

    /// Start the transport hub and announce readiness.
    pub async fn start(&self) -> Result<u16, KaraError> {
        let port = self.inner.hub.start().await?;
        tracing::info!(
            app = %self.inner.config.app.id,
            version = %self.inner.config.app.version,
            port,
            "Application ready"
        );
        self.inner.bus.publish(AppEvent::Ready { port });
        Ok(port)
    }

    /// [`App::new`] followed by [`App::start`].
    pub async fn launch(config: KaraConfig) -> Result<Self, KaraError> {
        let app = Self::new(config);
        app.start().await?;
        Ok(app)
    }

    /// Spawn a renderer window with the configured defaults.
    pub fn create_window(&self) -> Result<Window, KaraError> {
        self.create_window_with(WindowOptions::default())
    }

    pub fn create_window_with(&self, options: WindowOptions) -> Result<Window, KaraError> {
        Window::spawn(self, options)
    }

    /// The IPC dispatcher, for registering handlers and listeners.
    pub fn ipc(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.inner.ipc)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.inner.bus.subscribe()
    }

    /// The bound transport port, once started.
    pub fn port(&self) -> Option<u16> {
        self.inner.hub.port()
    }

    pub fn window_count(&self) -> usize {
        self.inner.lifecycle.live_count()
    }

    pub fn config(&self) -> &KaraConfig {
        &self.inner.config
    }

    /// Version of the controlling application, from `app.version`.
    pub fn version(&self) -> &str {
        &self.inner.config.app.version
    }

    /// Close every window, stop the hub and publish [`AppEvent::Shutdown`].
    pub async fn quit(&self) {
        self.inner.lifecycle.shutdown(&self.inner.hub).await;
    }

    pub(crate) fn hub(&self) -> &Hub {
        &self.inner.hub
    }

    pub(crate) fn bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.inner.bus)
    }

    pub(crate) fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.inner.lifecycle)
    }
}
