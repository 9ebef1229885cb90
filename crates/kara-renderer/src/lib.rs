//! Renderer side of the Kara transport.
//!
//! A renderer process reads its startup parameters from the environment
//! ([`RendererEnv`]), connects back to the hub and registers
//! ([`RendererClient`]). Webview renderers inject [`bootstrap::init_script`]
//! instead and talk the same protocol from JavaScript.

pub mod bootstrap;
pub mod client;
pub mod env;
pub mod error;
mod pending;

pub use client::RendererClient;
pub use env::RendererEnv;
pub use error::RendererError;
