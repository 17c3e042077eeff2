//! # Receiver Error Handling
//!
//! This module defines the RxError enum, which represents the errors that can
//! occur outside the decode path. Rejected captures are not errors; they are
//! reported through `wmbus::packet::Rejected`, and component failures keep
//! their own types (`DecodeError`, `CrcStripError`, `TransceiverError`).

use thiserror::Error;

/// Represents the different error types that can occur in the receiver crate.
#[derive(Debug, Error)]
pub enum RxError {
    /// Indicates an invalid configuration value.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Indicates a malformed JSON document.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Indicates a malformed line in a capture file.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Indicates a file system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for receiver operations
pub type Result<T> = std::result::Result<T, RxError>;
