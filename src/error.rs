//! Error handling and types

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// One entry of a subtree copy that could not be transferred
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyFailure {
    /// Path in the library
    pub source: PathBuf,
    /// Path on the device
    pub destination: PathBuf,
    /// Underlying error message
    pub reason: String,
}

impl fmt::Display for CopyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {}: {}",
            self.source.display(),
            self.destination.display(),
            self.reason
        )
    }
}

/// Synchronization and file operation errors
#[derive(Error, Debug)]
pub enum SyncError {
    /// Standard I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File copy operation failed
    #[error("Copy operation failed: {0}")]
    CopyFailed(String),

    /// At least one entry of a replicated subtree failed to copy
    #[error("Failed to copy {} entries under {}", .failures.len(), .root.display())]
    TreeCopyFailed {
        /// Root of the subtree being replicated
        root: PathBuf,
        /// Every failure collected during the walk
        failures: Vec<CopyFailure>,
    },

    /// Directory traversal failed
    #[error("Directory traversal failed: {0}")]
    DirectoryTraversal(String),

    /// General filesystem error
    #[error("File system error: {0}")]
    FileSystem(String),

    /// Stream info could not be read from an audio file
    #[error("Could not probe audio stream of {}: {reason}", .path.display())]
    AudioProbe { path: PathBuf, reason: String },

    /// The audio container has no tag support in this build
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Reading or writing a tag container failed
    #[error("Tag operation failed: {0}")]
    Tag(String),

    /// A library tag has no counterpart on the device copy
    #[error("Tag `{tag}` is missing from {}", .path.display())]
    TagKeyMismatch { path: PathBuf, tag: String },

    /// The device has no file under the library file's name
    #[error("Device file is missing: {}", .0.display())]
    MissingTarget(PathBuf),

    /// A song could not be reconciled even after repairing it
    #[error("Could not reconcile {}: {source}", .path.display())]
    UnrecoverableSong {
        path: PathBuf,
        #[source]
        source: Box<SyncError>,
    },

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal application error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Whether the song-level repair path (re-match, then fix tags) can resolve this error
    #[must_use]
    pub const fn is_repairable(&self) -> bool {
        matches!(self, Self::TagKeyMismatch { .. } | Self::MissingTarget(_))
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_key_mismatch_and_missing_target_are_repairable() {
        let mismatch = SyncError::TagKeyMismatch {
            path: PathBuf::from("/dev/a.flac"),
            tag: "TITLE".to_string(),
        };
        assert!(mismatch.is_repairable());
        assert!(SyncError::MissingTarget(PathBuf::from("/dev/a.flac")).is_repairable());

        assert!(!SyncError::Tag("corrupt header".to_string()).is_repairable());
        assert!(!SyncError::Io(std::io::Error::other("boom")).is_repairable());
        let fatal = SyncError::UnrecoverableSong {
            path: PathBuf::from("/lib/a.flac"),
            source: Box::new(mismatch),
        };
        assert!(!fatal.is_repairable());
    }

    #[test]
    fn test_unrecoverable_song_names_file_and_cause() {
        let err = SyncError::UnrecoverableSong {
            path: PathBuf::from("/lib/Artist/Album/01.flac"),
            source: Box::new(SyncError::TagKeyMismatch {
                path: PathBuf::from("/dev/Artist/Album/01.flac"),
                tag: "GENRE".to_string(),
            }),
        };
        let message = err.to_string();
        assert!(message.contains("/lib/Artist/Album/01.flac"));
        assert!(message.contains("GENRE"));
    }

    #[test]
    fn test_tree_copy_failed_reports_count() {
        let err = SyncError::TreeCopyFailed {
            root: PathBuf::from("/lib/Artist"),
            failures: vec![CopyFailure {
                source: PathBuf::from("/lib/Artist/a"),
                destination: PathBuf::from("/dev/Artist/a"),
                reason: "denied".to_string(),
            }],
        };
        assert_eq!(err.to_string(), "Failed to copy 1 entries under /lib/Artist");
    }
}
