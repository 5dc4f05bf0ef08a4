//! Error handling for cprdec
//!
//! The decoding pipeline itself never fails: missing evidence falls back to
//! defaults and malformed values are skipped. Errors exist only at the I/O
//! and serialization boundaries.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for cprdec operations
pub type Result<T> = std::result::Result<T, CprError>;

/// Main error type for cprdec operations
#[derive(Error, Debug)]
pub enum CprError {
    #[error("failed to read project file: {}", path.display())]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output: {}", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
