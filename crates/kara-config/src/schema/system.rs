//! Application identity, IPC and logging settings.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Application identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// Unique application name.
    pub id: String,
    pub version: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            id: "kara-app".into(),
            version: "0.1.0".into(),
        }
    }
}

/// IPC dispatcher settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Timeout for hub-initiated invokes. Unset means wait until the reply
    /// arrives or the window closes.
    pub invoke_timeout_ms: Option<u64>,
}

impl IpcConfig {
    pub fn invoke_timeout(&self) -> Option<Duration> {
        self.invoke_timeout_ms.map(Duration::from_millis)
    }
}

/// Log level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            other => Err(format!("unknown log level `{other}`")),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: LogLevel,
}

impl LoggingConfig {
    /// Filter directives for `tracing_subscriber::EnvFilter`, covering the
    /// binary and every library crate.
    pub fn directive(&self) -> String {
        let level = self.level.as_str();
        ["kara", "kara_hub", "kara_renderer", "kara_common", "kara_config"]
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}
