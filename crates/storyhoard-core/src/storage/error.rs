//! Storage error handling
//!
//! One error type for the local store, the remote store and the image
//! files, with descriptive messages and recovery suggestions.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::models::EntityKind;

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Insert of an id that is already stored
    #[error("{kind} {id} already exists")]
    DuplicateKey { kind: EntityKind, id: Uuid },

    /// Update or delete of an id that is not stored
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: Uuid },

    /// Update tried to move a record to a different parent
    #[error("{kind} {id} cannot be moved to another {parent}")]
    ParentChanged {
        kind: EntityKind,
        id: Uuid,
        parent: EntityKind,
    },

    /// Remote store request failed
    #[error("Remote store error: {0}")]
    Transport(String),

    /// Image could not be encoded or decoded
    #[error("Image conversion failed for media {id}: {details}")]
    Conversion { id: Uuid, details: String },

    /// Criteria named a field the table does not have
    #[error("Unknown field '{field}' for table '{table}'")]
    UnknownField {
        table: &'static str,
        field: &'static str,
    },

    /// SQLite database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create data directory
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Permission denied accessing path
    #[error("Permission denied: cannot access '{path}'. Check file permissions.")]
    PermissionDenied {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Disk is full or quota exceeded
    #[error(
        "Disk full or quota exceeded while writing to '{path}'. Free up disk space and try again."
    )]
    DiskFull {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to read file
    #[error("Failed to read '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Failed to write file
    #[error("Failed to write '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// File not found (when expected to exist)
    #[error("File not found: '{path}'")]
    FileNotFound { path: PathBuf },

    /// Atomic write failed during rename
    #[error("Atomic write failed: could not rename '{from}' to '{to}': {source}")]
    AtomicWriteFailed {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    /// Create an error from an I/O error with path context
    ///
    /// Classifies the error based on its kind (permission, disk full, etc.)
    pub fn from_io(error: io::Error, path: PathBuf) -> Self {
        match error.kind() {
            io::ErrorKind::PermissionDenied => StoreError::PermissionDenied {
                path,
                source: error,
            },
            io::ErrorKind::NotFound => StoreError::FileNotFound { path },
            _ if is_disk_full_error(&error) => StoreError::DiskFull {
                path,
                source: error,
            },
            _ => StoreError::WriteError {
                path,
                source: error,
            },
        }
    }

    /// Like `from_io`, but unclassified failures are reported as reads
    pub fn from_io_read(error: io::Error, path: PathBuf) -> Self {
        match StoreError::from_io(error, path) {
            StoreError::WriteError { path, source } => StoreError::ReadError { path, source },
            other => other,
        }
    }

    /// Whether this is a remote I/O failure
    pub fn is_transport(&self) -> bool {
        matches!(self, StoreError::Transport(_))
    }

    /// Get a recovery suggestion for this error
    pub fn recovery_suggestion(&self) -> Option<&'static str> {
        match self {
            StoreError::DiskFull { .. } => Some("Free up disk space and try again."),
            StoreError::PermissionDenied { .. } => {
                Some("Check file and directory permissions. You may need to run with different permissions or change ownership.")
            }
            StoreError::CreateDirectory { .. } => {
                Some("Check that the parent directory exists and you have write permissions.")
            }
            StoreError::Transport(_) => {
                Some("Check the server URL and your network connection, then sync again.")
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(error: reqwest::Error) -> Self {
        StoreError::Transport(error.to_string())
    }
}

/// A detached publish that panicked or was cancelled
impl From<tokio::task::JoinError> for StoreError {
    fn from(error: tokio::task::JoinError) -> Self {
        StoreError::Transport(format!("background task failed: {}", error))
    }
}

/// Check if an I/O error indicates disk full condition
fn is_disk_full_error(error: &io::Error) -> bool {
    let msg = error.to_string().to_lowercase();
    msg.contains("no space left")
        || msg.contains("disk full")
        || msg.contains("quota exceeded")
        || msg.contains("not enough space")
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
