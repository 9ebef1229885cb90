//! Configuration schema types for Kara.
//!
//! All structs use `serde(default)` so partial configs work correctly.

mod renderer;
mod system;
mod transport;

pub use renderer::*;
pub use system::*;
pub use transport::*;

use serde::{Deserialize, Serialize};

/// File name looked up in an application directory.
pub const CONFIG_FILE_NAME: &str = "kara.toml";

/// Root configuration for a Kara application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KaraConfig {
    pub app: AppSection,
    pub transport: TransportConfig,
    pub renderer: RendererConfig,
    pub ipc: IpcConfig,
    pub logging: LoggingConfig,
}
