//! Error types for the conversion engine.

use luar_core::ValueError;
use thiserror::Error;

/// Errors that can occur when converting between host and Lua values.
#[derive(Debug, Error)]
pub enum ConversionError {
    /// The script value's kind does not fit the destination type.
    #[error("cannot convert {script} to {host}")]
    TypeMismatch { script: String, host: String },

    /// The destination of [`lua_to_host_into`](crate::lua_to_host_into) is
    /// not a non-nil pointer.
    #[error("destination is not a non-nil pointer: {ty}")]
    NotAPointer { ty: String },

    /// The value graph nests deeper than the configured limit.
    #[error("conversion exceeded the maximum depth of {limit}")]
    DepthExceeded { limit: usize },

    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Lua(#[from] mlua::Error),
}

impl ConversionError {
    pub(crate) fn mismatch(script: impl Into<String>, host: impl ToString) -> Self {
        ConversionError::TypeMismatch {
            script: script.into(),
            host: host.to_string(),
        }
    }

    /// Failures that a struct decode skips instead of aborting on.
    pub(crate) fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ConversionError::TypeMismatch { .. } | ConversionError::Value(_)
        )
    }
}

impl From<ConversionError> for mlua::Error {
    fn from(err: ConversionError) -> Self {
        match err {
            ConversionError::Lua(inner) => inner,
            other => mlua::Error::RuntimeError(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_mismatch_names_both_sides() {
        let err = ConversionError::mismatch("string", "int");
        assert_eq!(err.to_string(), "cannot convert string to int");
        assert!(err.is_recoverable());
    }

    #[test]
    fn depth_exceeded_is_fatal() {
        let err = ConversionError::DepthExceeded { limit: 4 };
        assert!(err.to_string().contains('4'));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn into_lua_error() {
        let err: mlua::Error = ConversionError::mismatch("table", "bool").into();
        match err {
            mlua::Error::RuntimeError(message) => {
                assert_eq!(message, "cannot convert table to bool")
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let original = mlua::Error::RuntimeError("boom".to_string());
        let err: mlua::Error = ConversionError::from(original).into();
        assert!(matches!(err, mlua::Error::RuntimeError(m) if m == "boom"));
    }
}
