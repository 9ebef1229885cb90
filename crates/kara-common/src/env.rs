//! Startup parameters handed to renderer processes through their environment.
//!
//! The hub never passes these on the command line so they stay out of
//! process listings.

pub const WINDOW_ID: &str = "KARA_ID";
pub const TRANSPORT_HOST: &str = "KARA_WS_HOST";
pub const TRANSPORT_PORT: &str = "KARA_WS_PORT";
pub const TRANSPORT_TOKEN: &str = "KARA_WS_TOKEN";
pub const DEBUG: &str = "KARA_DEBUG";
pub const LOADER: &str = "KARA_LOADER";

/// Encode a debug flag the way renderers expect it.
pub fn debug_flag(enabled: bool) -> &'static str {
    if enabled {
        "1"
    } else {
        "0"
    }
}

/// `host:port`, with IPv6 literals bracketed.
pub fn host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}
