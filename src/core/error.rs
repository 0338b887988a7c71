/// Sqlwrap Error Module
///
/// This module defines the error types shared by the connection manager,
/// the query builder and the driver layer.
use thiserror::Error;

use crate::core::db::driver::DriverError;

/// Error type for every fallible sqlwrap operation.
///
/// Validation problems on the high-level data operations are reported through
/// logging and a zero result instead of this type; see
/// [`ConnectionManager`](crate::core::db::ConnectionManager).
#[derive(Error, Debug)]
pub enum SqlwrapError {
    /// A failure reported by the driver (connect, execute, fetch)
    #[error("Driver error: {0}")]
    Driver(#[from] DriverError),

    /// No usable connection could be established for the operation
    #[error("No connection: {0}")]
    NoConnection(String),

    /// Invalid input to the query builder (missing table, empty value set)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration loading and validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system and I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed TOML configuration
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl SqlwrapError {
    /// Returns `true` when the underlying driver classified the failure as
    /// transient (a lost or unusable connection).
    pub fn is_transient(&self) -> bool {
        matches!(self, SqlwrapError::Driver(e) if e.is_transient())
    }
}

/// Type alias for Result to use SqlwrapError as the error type.
pub type Result<T> = std::result::Result<T, SqlwrapError>;
