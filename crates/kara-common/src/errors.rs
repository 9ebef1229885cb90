use std::path::PathBuf;
use std::time::Duration;

use crate::id::WindowId;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ParseError(String),

    #[error("config validation error: {0}")]
    ValidationError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum KaraError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("failed to bind transport on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn renderer `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("transport hub has not been started")]
    HubNotStarted,

    #[error("transport hub is already started")]
    AlreadyStarted,

    #[error("a handler is already registered for `{0}`")]
    HandlerExists(String),

    #[error("window {0} is closed")]
    WindowClosed(WindowId),

    #[error("invoke on `{channel}` timed out after {after:?}")]
    InvokeTimeout { channel: String, after: Duration },

    #[error("remote error: {0}")]
    Remote(String),

    #[error("{0}")]
    Other(String),
}
