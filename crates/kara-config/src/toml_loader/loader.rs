//! Core TOML config loading: read from a path, an app directory, or the
//! platform default.

use std::path::Path;

use kara_common::ConfigError;
use tracing::{debug, info};

use crate::schema::{KaraConfig, CONFIG_FILE_NAME};
use crate::validation;

use super::paths::default_config_path;

/// Load and validate config from a specific TOML file path.
///
/// Missing fields take their serde defaults. Unlike a missing file,
/// invalid values are a hard error: a bad grace period or an empty
/// renderer program would only fail later and less clearly.
pub fn load_from_path(path: &Path) -> Result<KaraConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::FileNotFound(path.to_path_buf()));
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ParseError(format!("failed to read {}: {e}", path.display())))?;

    let config: KaraConfig = toml::from_str(&content)
        .map_err(|e| ConfigError::ParseError(format!("failed to parse TOML: {e}")))?;

    validation::validate(&config)?;

    info!("loaded config from {}", path.display());
    Ok(config)
}

/// Load `kara.toml` from an application directory, falling back to
/// defaults when the directory has none.
pub fn load_from_dir(dir: &Path) -> Result<KaraConfig, ConfigError> {
    match load_from_path(&dir.join(CONFIG_FILE_NAME)) {
        Err(ConfigError::FileNotFound(path)) => {
            debug!("no config at {}, using defaults", path.display());
            Ok(KaraConfig::default())
        }
        other => other,
    }
}

/// Load config from the platform-specific default path, falling back to
/// defaults when the file does not exist.
pub fn load_default() -> Result<KaraConfig, ConfigError> {
    let path = default_config_path()?;
    match load_from_path(&path) {
        Err(ConfigError::FileNotFound(_)) => Ok(KaraConfig::default()),
        other => other,
    }
}
