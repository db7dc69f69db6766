//! Error types for property-cache

use thiserror::Error;

/// Failures reported by a platform service
///
/// The cache never surfaces these to registry consumers; a failed lookup is
/// stored as an absent value and logged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The object is not managed by the service
    #[error("Unknown object: {0}")]
    UnknownObject(String),

    /// The object does not implement the interface
    #[error("Object {udi} has no interface {interface}")]
    UnknownInterface { udi: String, interface: String },

    /// The interface has no such property
    #[error("Interface {interface} on {udi} has no property {property}")]
    UnknownProperty {
        udi: String,
        interface: String,
        property: String,
    },

    /// The call did not complete (timeout, disconnect, denied...)
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Errors while loading a cache configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type for platform service calls
pub type SourceResult<T> = std::result::Result<T, SourceError>;

/// Result type for configuration loading
pub type Result<T> = std::result::Result<T, ConfigError>;
