//! Error types for host values and host callables.

use thiserror::Error;

/// Errors raised while building, reading or mutating host values.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    /// A write-through operation was given something other than a pointer.
    #[error("not a pointer: {ty}")]
    NotAPointer { ty: String },

    /// A nil slice, map, pointer or channel was dereferenced or written to.
    #[error("nil {ty} dereference")]
    NilReference { ty: String },

    #[error("index {index} out of range (length {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("no field `{name}` in type {ty}")]
    NoField { name: String, ty: String },

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("struct type {ty} is already defined")]
    AlreadyDefined { ty: String },

    #[error("struct {ty} has {expected} fields, got {got} values")]
    FieldCount {
        ty: String,
        expected: usize,
        got: usize,
    },
}

/// Errors returned by host callables.
#[derive(Debug, Error)]
pub enum NativeError {
    /// The callable panicked; the panic was recovered at the call boundary.
    #[error("host function panicked: {message}")]
    Panic { message: String },

    #[error("{message}")]
    Other { message: String },

    #[error(transparent)]
    Value(#[from] ValueError),
}

impl NativeError {
    /// Create a generic error with a message.
    pub fn other(message: impl Into<String>) -> Self {
        NativeError::Other {
            message: message.into(),
        }
    }
}
