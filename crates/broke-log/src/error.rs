//! Error types for broke-log
//!
//! Write-path, read-path and locking failures all surface as [`LogError`].

use std::time::Duration;

use thiserror::Error;

use crate::lock::LockMode;

/// Convenience alias used throughout the crate
pub type Result<T, E = LogError> = std::result::Result<T, E>;

/// Errors that can occur while writing or reading a log file
#[derive(Debug, Error)]
pub enum LogError {
    /// Underlying I/O failure (open, read, write, seek, decompression)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The advisory lock could not be obtained within the configured bound
    #[error("could not acquire {mode} lock within {timeout:?}")]
    LockTimeout {
        /// Requested lock mode
        mode: LockMode,
        /// Configured acquisition bound
        timeout: Duration,
    },

    /// Rejected input (topic not ASCII, topic too long, oversized payload)
    #[error("validation error: {0}")]
    Validation(String),

    /// A header did not carry the expected magic or reserved bytes
    #[error("format error: {0}")]
    Format(String),

    /// Fewer bytes were available than a header promised
    #[error("short read: expected {expected} bytes, got {actual}")]
    ShortRead {
        /// Bytes the header announced
        expected: usize,
        /// Bytes actually available
        actual: usize,
    },

    /// Stored block checksum does not match the recomputed one
    #[error("checksum mismatch: header says {expected:#010x}, block hashes to {actual:#010x}")]
    Checksum {
        /// Checksum stored in the block header
        expected: u32,
        /// Checksum computed over the block bytes
        actual: u32,
    },

    /// An append failed and truncating the partial block failed as well.
    ///
    /// `source` is the original append error; `truncate` is reported alongside.
    #[error("append failed ({source}); truncating back to offset {offset} also failed: {truncate}")]
    RecoveryFailed {
        /// The append error that triggered recovery
        #[source]
        source: Box<LogError>,
        /// Offset the file should have been truncated to
        offset: u64,
        /// Why the truncate failed
        truncate: std::io::Error,
    },
}

impl LogError {
    /// Create a new Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create a new Format error
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format(message.into())
    }

    /// Whether this error means the file contents cannot be trusted
    /// from the current position on.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::Format(_) | Self::ShortRead { .. } | Self::Checksum { .. }
        )
    }

    /// Whether this is a lock timeout
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}
