//! Core error types for resfs file managers.
//!
//! Every file manager operation returns a [`FileResult`]. Failures are logged
//! where they happen and then surfaced to the caller through [`FileError`],
//! so resource loaders can treat any error as "resource unavailable".

use std::path::Path;
use thiserror::Error;

/// File manager operation errors
#[derive(Error, Debug)]
pub enum FileError {
    /// The manager has no base path or no wrapped manager yet
    #[error("File manager not initialized")]
    NotInitialized,

    /// Empty, absolute or escaping path where a relative one is expected
    #[error("Invalid file path: {path}")]
    InvalidPath { path: String },

    /// File or archive entry not found
    #[error("File not found: {path}")]
    NotFound { path: String },

    /// Permission denied accessing file
    #[error("Permission denied: {path}")]
    PermissionDenied { path: String },

    /// Write conflict: the target exists and overwriting was not requested
    #[error("File already exists: {path}")]
    AlreadyExists { path: String },

    /// Contents exceed the in-memory read limit
    #[error("File too large: {path} exceeds {limit} bytes")]
    TooLarge { path: String, limit: u64 },

    /// Archive is corrupted, truncated or fails its CRC check
    #[error("Corrupted archive: {reason}")]
    CorruptedArchive { reason: String },

    /// A file manager could not be registered into a wrapper
    #[error("Registration rejected: {reason}")]
    Registration { reason: String },

    /// The backend does not implement the operation
    #[error("Operation not supported: {operation}")]
    Unsupported { operation: &'static str },

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip format error reported by the archive library
    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Internal error (unexpected conditions)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type for file manager operations
pub type FileResult<T> = Result<T, FileError>;

impl FileError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(err: std::io::Error, path: &Path) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => FileError::NotFound {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::PermissionDenied => FileError::PermissionDenied {
                path: path.display().to_string(),
            },
            std::io::ErrorKind::AlreadyExists => FileError::AlreadyExists {
                path: path.display().to_string(),
            },
            _ => FileError::Io(err),
        }
    }

    /// Shorthand for an [`FileError::InvalidPath`] error.
    pub fn invalid_path(path: impl Into<String>) -> Self {
        FileError::InvalidPath { path: path.into() }
    }

    /// Shorthand for a [`FileError::NotFound`] error.
    pub fn not_found(path: impl Into<String>) -> Self {
        FileError::NotFound { path: path.into() }
    }

    /// Whether this error only means "nothing there", as opposed to a real
    /// failure of the backend.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FileError::NotFound { .. })
    }
}

/// Keep the first error, unless a later one says more than "not found".
pub(crate) fn keep_most_specific(slot: &mut Option<FileError>, error: FileError) {
    let replace = match slot {
        None => true,
        Some(previous) => previous.is_not_found() && !error.is_not_found(),
    };
    if replace {
        *slot = Some(error);
    }
}
