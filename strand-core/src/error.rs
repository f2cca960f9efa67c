use thiserror::Error;

use crate::registry::StackKey;

pub type AnyError = anyhow::Error;
pub type AnyResult<T> = std::result::Result<T, AnyError>;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to the host. Handler failures never show up here, they are
/// routed to the pipeline's error handler instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("at least one handler is required when registering on `{0}`")]
    EmptyRegistration(StackKey),
    #[error("unknown method: {0:?}")]
    UnknownMethod(String),
}

/// A handler panicked while being called or polled.
// keep a String so the error stays Send + Sync inside anyhow
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("handler panicked: {0}")]
pub struct HandlerPanic(pub String);

impl HandlerPanic {
    pub(crate) fn from_payload(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = match payload.downcast::<String>() {
            Ok(s) => *s,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(s) => s.to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        HandlerPanic(message)
    }
}
