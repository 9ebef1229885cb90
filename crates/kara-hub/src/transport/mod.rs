//! WebSocket transport hub.
//!
//! The hub accepts renderer connections on a loopback port and routes
//! their frames by window identity. A connection becomes bound to an
//! identity when it sends a registration frame carrying that identity's
//! token. Frames that fail any check are dropped without a reply, and
//! without distinguishing the reason, so an unauthenticated peer learns
//! nothing about which identities exist.
//!
//! A dropped connection does not close its window immediately: the
//! window gets a grace period to re-register (page navigation reconnects
//! the socket), and only then does the listener's close callback run.

mod connection;
mod hub;
mod registry;

#[cfg(test)]
mod tests;

use kara_common::{ApplicationMessage, OutboundFrame, SystemCall, SystemMessage, WindowId};

use crate::token::Token;

pub use connection::ConnectionHandle;
pub use hub::Hub;

/// Receives authenticated application messages from bound connections.
///
/// Called on the connection's task, so implementations must not block;
/// spawn for anything slow.
pub trait InboundRouter: Send + Sync {
    fn route(&self, ctx: CallContext, message: ApplicationMessage);
}

/// Where an application message came from, and how to answer it.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub window_id: WindowId,
    pub(crate) token: Token,
    pub connection: ConnectionHandle,
}

impl CallContext {
    /// Send an application message back on the originating connection.
    /// Returns `false` if that connection is gone.
    pub fn reply(&self, message: &ApplicationMessage) -> bool {
        self.connection
            .send_frame(&OutboundFrame::application(self.token.as_str(), message))
    }
}

/// Body of a hub → window frame.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    System(SystemMessage),
    Application(ApplicationMessage),
}

impl OutboundBody {
    pub(crate) fn to_frame(&self, token: &Token) -> OutboundFrame {
        match self {
            Self::System(message) => OutboundFrame::system(token.as_str(), message),
            Self::Application(message) => OutboundFrame::application(token.as_str(), message),
        }
    }
}

impl From<SystemCall> for OutboundBody {
    fn from(call: SystemCall) -> Self {
        Self::System(call.to_message())
    }
}

impl From<SystemMessage> for OutboundBody {
    fn from(message: SystemMessage) -> Self {
        Self::System(message)
    }
}

impl From<ApplicationMessage> for OutboundBody {
    fn from(message: ApplicationMessage) -> Self {
        Self::Application(message)
    }
}
