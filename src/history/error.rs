use std::path::PathBuf;
use thiserror::Error;

use crate::core::DocumentError;

/// Errors that can occur while loading, validating or saving the history.
#[derive(Debug, Error)]
pub enum HistoryError {
    /// History file exists but cannot be read.
    #[error("Failed to read history {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    /// History file is not well-formed JSON.
    #[error("Failed to load history {path} (line {line}, column {column}): {message}")]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
        message: String,
    },
    /// A required top-level key is absent.
    #[error("History does not have required key '{0}'. It may be misformatted.")]
    MissingKey(&'static str),
    /// A required per-image key is absent.
    #[error("Image entry for '{image}' lacks expected entry '{key}'")]
    MissingImageKey { image: String, key: &'static str },
    /// A `last-access` value does not match `YYYY-MM-DD HH:MM:SS`.
    #[error("Image entry '{image}' has bad last-access value '{value}'")]
    BadTimestamp { image: String, value: String },
    /// A key is present but holds the wrong kind of value.
    #[error("History has an invalid value: {0}")]
    InvalidValue(String),
    /// Atomic write operation failed.
    #[error("Atomic write failed: {0}")]
    WriteFailed(String),
    /// Failed to create backup file.
    #[error("Failed to create backup: {0}")]
    BackupFailed(String),
    /// The image directory cannot be listed.
    #[error("Cannot list image directory {path}: {source}")]
    BaseDirUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// `index` named a file that does not exist under the base path.
    #[error("Could not locate image '{image}' at {base_path}")]
    ImageNotFound { image: String, base_path: PathBuf },
    /// An edit to the document was rejected.
    #[error(transparent)]
    Document(#[from] DocumentError),
    /// Generic I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
