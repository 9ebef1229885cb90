//! Config path resolution.

use kara_common::ConfigError;

use crate::schema::CONFIG_FILE_NAME;

/// Get the platform-specific default config file path.
///
/// On macOS: `~/Library/Application Support/kara/kara.toml`
/// On Linux: `~/.config/kara/kara.toml`
pub fn default_config_path() -> Result<std::path::PathBuf, ConfigError> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::ParseError("could not determine config directory".into()))?;
    Ok(config_dir.join("kara").join(CONFIG_FILE_NAME))
}
