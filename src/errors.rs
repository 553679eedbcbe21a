//! Error types for Cerberus LDAP.
//!
//! This module defines all error types used throughout the library.

use thiserror::Error;

use crate::filters::FilterError;

/// Result type alias for Cerberus operations.
pub type Result<T> = std::result::Result<T, CerberusError>;

/// Main error type for Cerberus LDAP operations.
#[derive(Error, Debug)]
pub enum CerberusError {
    /// Invalid directory definition (YAML or tag semantics)
    #[error("invalid directory definition at line {line}, column {col}: {reason}")]
    Parse {
        /// Line of the offending YAML node (1-based)
        line: usize,
        /// Column of the offending YAML node (1-based)
        col: usize,
        /// What went wrong
        reason: String,
    },

    /// Template rendering error (before YAML parsing)
    #[error("template rendering failed: {0}")]
    Template(String),

    /// Search filter evaluation error
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Double bind on the same connection
    #[error("connection already authenticated")]
    AlreadyAuthenticated,

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// TLS setup error
    #[error("TLS setup failed: {0}")]
    Tls(String),

    /// Password hashing error
    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    /// Password verification error
    #[error("password verification failed: {0}")]
    PasswordVerify(String),

    /// Unsupported password hash scheme
    #[error("unsupported hash scheme: {0}")]
    UnsupportedHashScheme(String),

    /// I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
