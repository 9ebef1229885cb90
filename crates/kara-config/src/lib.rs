//! Kara configuration system.
//!
//! TOML-based configuration for the transport hub, renderer processes,
//! IPC and logging. Every section uses serde defaults so partial files
//! (or no file at all) work out of the box.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use kara_config::{load_from_dir, config_to_json};
//!
//! let config = load_from_dir(std::path::Path::new(".")).expect("failed to load config");
//! println!("{}", config_to_json(&config));
//! ```

pub mod schema;
pub mod toml_loader;
pub mod validation;

pub use schema::{
    AppSection, IpcConfig, KaraConfig, LogLevel, LoggingConfig, RendererConfig, TransportConfig,
    CONFIG_FILE_NAME,
};
pub use toml_loader::{default_config_path, load_default, load_from_dir, load_from_path};
pub use validation::validate;

/// Serialize a config to a pretty-printed JSON string.
pub fn config_to_json(config: &KaraConfig) -> String {
    serde_json::to_string_pretty(config)
        .unwrap_or_else(|e| format!("{{\"error\": \"failed to serialize config: {e}\"}}"))
}
