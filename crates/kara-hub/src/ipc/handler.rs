use std::future::Future;

use async_trait::async_trait;
use kara_common::{KaraError, WindowId};
use serde_json::Value;

/// An invoke request as seen by a handler. The correlation id has already
/// been taken off the front of the argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct IpcRequest {
    pub window_id: WindowId,
    pub method: String,
    pub args: Vec<Value>,
}

impl IpcRequest {
    /// Argument `index` as a string, if present and a string.
    pub fn str_arg(&self, index: usize) -> Option<&str> {
        self.args.get(index).and_then(Value::as_str)
    }
}

/// A failure reported back to the caller as the error slot of the reply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<KaraError> for HandlerError {
    fn from(err: KaraError) -> Self {
        Self(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

pub type HandlerResult = Result<Value, HandlerError>;

/// Answers invoke requests for one method name.
#[async_trait]
pub trait InvokeHandler: Send + Sync {
    async fn call(&self, request: IpcRequest) -> HandlerResult;
}

#[async_trait]
impl<F, Fut> InvokeHandler for F
where
    F: Fn(IpcRequest) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    async fn call(&self, request: IpcRequest) -> HandlerResult {
        (self)(request).await
    }
}
