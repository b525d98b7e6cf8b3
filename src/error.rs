//! Error types for mapped log writers and rotation.

use std::path::PathBuf;

/// Errors that can occur while writing or rotating a mapped log file.
#[derive(Debug, thiserror::Error)]
pub enum MemlogError {
    /// Opening (creating, sizing, or mapping) a log file failed.
    ///
    /// Carries the number of attempts made so callers can distinguish a
    /// first-try failure from an exhausted retry policy.
    #[error("failed opening {} for writing after {attempts} attempt(s): {source}", path.display())]
    Open {
        /// Path that could not be opened.
        path: PathBuf,
        /// Number of open attempts made before giving up.
        attempts: u32,
        /// Underlying OS error from the last attempt.
        source: std::io::Error,
    },

    /// A rename or delete failed while shifting numbered generations.
    #[error("rotation failed moving {} to {}: {source}", src.display(), target.display())]
    Rotation {
        /// Generation file being renamed or deleted.
        src: PathBuf,
        /// Destination name (equal to `src` for a failed delete).
        target: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// Construction parameters are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A reopen or write was requested on a writer that was never opened.
    #[error("writer for {} was not opened before use", path.display())]
    NotOpened {
        /// Path recorded at construction, if any.
        path: PathBuf,
    },

    /// An append would overrun the preallocated mapping.
    #[error(
        "append of {requested} bytes exceeds remaining capacity ({remaining} of {capacity}) in {}",
        path.display()
    )]
    CapacityExceeded {
        /// Path of the mapped file.
        path: PathBuf,
        /// Length of the rejected record.
        requested: usize,
        /// Bytes still free in the mapping.
        remaining: usize,
        /// Total preallocated capacity.
        capacity: usize,
    },

    /// IO error outside of open and rotation (flush, close-time truncate).
    #[error("IO error on {}: {source}", path.display())]
    Io {
        /// Path of the affected file.
        path: PathBuf,
        /// Underlying OS error.
        source: std::io::Error,
    },
}
