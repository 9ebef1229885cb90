//! Startup parameters a renderer receives from the hub.

use std::fmt;

use kara_common::env::{
    host_port, DEBUG, LOADER, TRANSPORT_HOST, TRANSPORT_PORT, TRANSPORT_TOKEN, WINDOW_ID,
};
use kara_common::WindowId;

use crate::error::RendererError;

const DEFAULT_HOST: &str = "127.0.0.1";

#[derive(Clone, PartialEq, Eq)]
pub struct RendererEnv {
    pub id: WindowId,
    /// Hub interface; `127.0.0.1` when the hub did not pass one.
    pub host: String,
    pub port: u16,
    pub token: String,
    pub debug: bool,
    /// Bootstrap code location, when the hub passed one.
    pub loader: Option<String>,
}

impl RendererEnv {
    /// Read the parameters from this process's environment.
    pub fn from_env() -> Result<Self, RendererError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the parameters through `lookup`. Id, port and token are
    /// required; debug is on only for exactly `"1"`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RendererError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(RendererError::MissingEnv(name))
        };

        let id = required(WINDOW_ID)?;
        let raw_port = required(TRANSPORT_PORT)?;
        let port = raw_port
            .parse::<u16>()
            .ok()
            .filter(|port| *port != 0)
            .ok_or(RendererError::InvalidEnv {
                name: TRANSPORT_PORT,
                value: raw_port,
            })?;
        let token = required(TRANSPORT_TOKEN)?;

        Ok(Self {
            id: WindowId::from(id),
            host: lookup(TRANSPORT_HOST)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port,
            token,
            debug: lookup(DEBUG).as_deref() == Some("1"),
            loader: lookup(LOADER).filter(|value| !value.is_empty()),
        })
    }

    /// Address of the hub.
    pub fn url(&self) -> String {
        format!("ws://{}", host_port(&self.host, self.port))
    }
}

impl fmt::Debug for RendererEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RendererEnv")
            .field("id", &self.id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("token", &"[REDACTED]")
            .field("debug", &self.debug)
            .field("loader", &self.loader)
            .finish()
    }
}
