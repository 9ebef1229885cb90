//! Process-wide window bookkeeping.
//!
//! Tracks which windows are live and publishes
//! [`AppEvent::AllWindowsClosed`] when the last one goes away. It holds
//! weak references only, so a window nobody holds can still be dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use kara_common::{AppEvent, EventBus, WindowId};

use crate::transport::Hub;

/// Something the coordinator can close during shutdown.
#[async_trait]
pub(crate) trait LiveWindow: Send + Sync {
    async fn close(&self);
}

pub struct Lifecycle {
    bus: Arc<EventBus>,
    windows: Mutex<HashMap<WindowId, Weak<dyn LiveWindow>>>,
}

impl Lifecycle {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Number of windows created and not yet closed.
    pub fn live_count(&self) -> usize {
        self.windows().len()
    }

    pub(crate) fn window_opened(&self, id: &WindowId, window: Weak<dyn LiveWindow>) {
        let count = {
            let mut windows = self.windows();
            windows.insert(id.clone(), window);
            windows.len()
        };
        tracing::debug!(window = %id, live = count, "Window opened");
        self.bus.publish(AppEvent::WindowOpened(id.clone()));
    }

    /// Record that `id` closed. Returns `true` if that emptied the set, in
    /// which case the all-closed event has been published. Repeated calls
    /// for the same window do nothing.
    pub(crate) fn window_closed(&self, id: &WindowId) -> bool {
        let emptied = {
            let mut windows = self.windows();
            windows.remove(id).is_some() && windows.is_empty()
        };
        if emptied {
            tracing::info!("All windows closed");
            self.bus.publish(AppEvent::AllWindowsClosed);
        }
        emptied
    }

    /// Close every live window, one after another. Entries whose window
    /// was dropped without closing are forgotten.
    pub async fn close_all(&self) {
        let tracked: Vec<(WindowId, Option<Arc<dyn LiveWindow>>)> = self
            .windows()
            .iter()
            .map(|(id, window)| (id.clone(), window.upgrade()))
            .collect();
        for (id, window) in tracked {
            match window {
                Some(window) => window.close().await,
                None => {
                    self.window_closed(&id);
                }
            }
        }
    }

    /// Close all windows, stop the hub and announce shutdown.
    pub async fn shutdown(&self, hub: &Hub) {
        tracing::info!(live = self.live_count(), "Shutting down");
        self.close_all().await;
        hub.shutdown().await;
        self.bus.publish(AppEvent::Shutdown);
    }

    fn windows(&self) -> MutexGuard<'_, HashMap<WindowId, Weak<dyn LiveWindow>>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
