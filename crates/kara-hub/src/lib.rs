//! Transport hub and window lifecycle for Kara applications.
//!
//! One controlling process owns a WebSocket hub. Every window is an
//! external renderer process that connects back to the hub with the
//! identity and token it received in its environment:
//!
//! - [`token`]: per-window capability secrets
//! - [`transport`]: socket server, registration handshake, routing by
//!   window identity, reconnect grace period
//! - [`window`]: spawns and drives one renderer process
//! - [`ipc`]: named handlers and listeners for application messages
//! - [`lifecycle`]: live window tracking and the "all windows closed" signal
//! - [`app`]: the context object tying the above together

pub mod app;
pub mod ipc;
pub mod lifecycle;
pub mod token;
pub mod transport;
pub mod window;

pub use app::App;
pub use ipc::{Dispatcher, HandlerError, HandlerResult, InvokeHandler, IpcEvent, IpcRequest};
pub use lifecycle::Lifecycle;
pub use token::Token;
pub use transport::{CallContext, ConnectionHandle, Hub, InboundRouter, OutboundBody};
pub use window::{Window, WindowOptions, WindowState};
