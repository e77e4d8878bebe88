use crate::libraries::handoff::DeviceError;
use thiserror::Error;

/// Handy type alias for all runtime-related errors.
pub type RuntimeResult<T> = Result<T, RuntimeError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("invalid value: {0}")]
    Validation(String),
    #[error("no attribute '{name}'")]
    AttributeError { name: String },
    #[error("unreadable attribute")]
    UnreadableAttribute,
    #[error("type error: {0}")]
    TypeMismatch(String),
    #[error("operation '{0}' not supported")]
    UnsupportedOperation(&'static str),
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
    #[error("index {index} out of range for length {len}")]
    IndexOutOfBounds { index: i64, len: usize },
    #[error("no more object slots")]
    OutOfMemory,
    #[error("use of a freed object slot")]
    NullReference,
}
