//! # Rendering Error Types
//!
//! Recoverable errors for the instance batching crate. Only configuration
//! loading can fail recoverably; corrupted bookkeeping is a programmer error
//! and asserts instead of returning.

use thiserror::Error;

/// Errors that can occur while setting up instance batching.
#[derive(Error, Debug)]
pub enum InstancingError {
    /// Reading a configuration file failed.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// A configuration file did not parse as TOML.
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// A capacity field was zero.
    #[error("invalid config: {field} must be non-zero")]
    InvalidCapacity {
        /// Name of the offending field.
        field: &'static str,
    },
}

/// Result type for instancing operations.
pub type InstancingResult<T> = Result<T, InstancingError>;
