use serde::{Deserialize, Serialize};

/// How renderer (window) processes are launched.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Renderer executable. Resolved through `PATH` when not absolute.
    pub program: String,
    /// Extra command-line arguments. Secrets never go here.
    pub args: Vec<String>,
    /// Path or URI of the renderer-side bootstrap code.
    pub loader: String,
    /// Default debug flag for new windows.
    pub debug: bool,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            program: "kara-headless".into(),
            args: Vec::new(),
            loader: "client-bootloader.js".into(),
            debug: false,
        }
    }
}
