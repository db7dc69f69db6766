//! Error types for the backend contract

use thiserror::Error;

/// Errors raised while interpreting backend data
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// An interface type name did not match any known type
    #[error("Unknown interface type: {0}")]
    UnknownInterface(String),

    /// A property value could not be converted to the requested type
    #[error("Cannot convert property {property} to {expected}")]
    ValueConversion {
        property: String,
        expected: &'static str,
    },
}

/// Result type alias for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;
