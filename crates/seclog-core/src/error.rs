//! Error types for the security log engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or archiving security logs.
///
/// Lines that fail to parse are not errors: the parser simply yields no
/// record for them.
#[derive(Debug, Error)]
pub enum LogError {
    /// An archive identifier failed the naming check.
    #[error("invalid archive identifier: {0}")]
    InvalidIdentifier(String),

    /// The requested archive does not exist.
    #[error("archive not found: {0}")]
    ArchiveNotFound(String),

    /// An existing archive could not be opened.
    #[error("cannot open archive {archive}: {reason}")]
    ArchiveOpen {
        /// Archive file name.
        archive: String,
        /// Underlying failure.
        reason: String,
    },

    /// A daily file could not be written into its archive.
    #[error("cannot archive {file}: {reason}")]
    ArchiveWrite {
        /// Daily file name.
        file: String,
        /// Underlying failure.
        reason: String,
    },

    /// Another writer held the archive lock for too long.
    #[error("timed out waiting for archive lock: {}", .0.display())]
    LockTimeout(PathBuf),

    /// The engine configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A page request was out of range.
    #[error("invalid page request: {0}")]
    InvalidPage(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The archive container is malformed.
    #[error("archive format error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

impl LogError {
    /// Returns true if the error was caused by a bad request rather than
    /// by the engine or the filesystem.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidIdentifier(_) | Self::ArchiveNotFound(_) | Self::InvalidPage(_)
        )
    }
}

/// Result type alias for log operations.
pub type Result<T> = std::result::Result<T, LogError>;
