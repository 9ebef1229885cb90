pub mod env;
pub mod errors;
pub mod events;
pub mod id;
pub mod protocol;

pub use errors::{ConfigError, KaraError};
pub use events::{AppEvent, EventBus};
pub use id::{new_correlation_id, new_id, WindowId};
pub use protocol::{
    ApplicationMessage, FrameKind, InboundFrame, OutboundFrame, SystemCall, SystemMessage,
    REGISTRATION_LITERAL,
};

pub type Result<T> = std::result::Result<T, KaraError>;
