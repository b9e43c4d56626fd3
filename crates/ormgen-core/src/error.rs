//! Core error types.

use thiserror::Error;

/// Core scaffolding errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Row or configuration (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Entity is not part of the catalog.
    #[error("unknown entity '{0}'")]
    UnknownEntity(String),

    /// Field does not resolve on an entity.
    #[error("unknown field '{field}' on entity '{entity}'")]
    InvalidField {
        /// Entity the field was resolved against.
        entity: String,
        /// Offending field name or path.
        field: String,
    },

    /// Malformed lookup expression.
    #[error("invalid lookup: {0}")]
    InvalidLookup(String),

    /// Value cannot be coerced to the field type.
    #[error("invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field the value was meant for.
        field: String,
        /// Why the value was rejected.
        message: String,
    },

    /// Schema bundle failed validation.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Requested page does not exist.
    #[error("invalid page: {0}")]
    InvalidPage(String),

    /// Record not found.
    #[error("record not found")]
    NotFound,

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}
