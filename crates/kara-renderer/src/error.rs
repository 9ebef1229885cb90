use std::time::Duration;

use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum RendererError {
    #[error("missing environment variable {0}")]
    MissingEnv(&'static str),

    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("failed to connect to {url}: {source}")]
    Connect {
        url: String,
        #[source]
        source: tokio_tungstenite::tungstenite::Error,
    },

    #[error("connection to the hub is closed")]
    Closed,

    /// The error slot of an invoke reply.
    #[error("remote error: {0}")]
    Remote(Value),

    #[error("invoke on `{method}` timed out after {after:?}")]
    Timeout { method: String, after: Duration },
}
