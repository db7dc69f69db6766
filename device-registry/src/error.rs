//! Error types for device-registry

use thiserror::Error;

use device_predicate::PredicateError;

use crate::logging::LoggingError;

/// Errors surfaced by the registry
///
/// Lookups and queries never fail: unknown identifiers give invalid handles
/// and bad predicates give empty results. These errors cover construction,
/// lifecycle and the diagnostic variants of the query API.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The backend factory could not produce backends
    #[error("Backend factory failed: {0}")]
    BackendFactory(String),

    /// The context was torn down and cannot hand out a registry anymore
    #[error("Registry context has been torn down")]
    TornDown,

    /// A predicate string did not parse
    #[error("Invalid predicate: {0}")]
    Predicate(#[from] PredicateError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
