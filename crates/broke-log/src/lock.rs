//! Cooperative advisory file locking with bounded retry
//!
//! Locks are advisory: they only coordinate processes that use this crate
//! (or otherwise honour `flock`-style locks) and they are not reliable on
//! network filesystems.

use std::fmt;
use std::fs::File;
use std::io;
use std::thread;
use std::time::Instant;

use fs4::fs_std::FileExt;
use tracing::{trace, warn};

use crate::config::LockConfig;
use crate::error::{LogError, Result};

/// Lock flavour requested on the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Readers; any number may hold it at once
    Shared,
    /// Writers; excludes every other holder
    Exclusive,
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => f.write_str("shared"),
            LockMode::Exclusive => f.write_str("exclusive"),
        }
    }
}

/// An advisory lock held on a file, released on drop
#[derive(Debug)]
pub struct FileLock<'f> {
    file: &'f File,
    mode: LockMode,
}

impl<'f> FileLock<'f> {
    /// Acquire `mode` on `file`, retrying every `config.retry_interval`
    /// until `config.timeout` has elapsed.
    ///
    /// At least one attempt is always made, even with a zero timeout.
    ///
    /// # Errors
    ///
    /// Returns `LogError::LockTimeout` when the lock stays contended for the
    /// whole bound, or `LogError::Io` when the OS rejects the request outright.
    pub fn acquire(file: &'f File, mode: LockMode, config: &LockConfig) -> Result<Self> {
        let start = Instant::now();
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match try_lock(file, mode) {
                Ok(()) => {
                    if attempts > 1 {
                        trace!(%mode, attempts, waited = ?start.elapsed(), "Lock acquired after retry");
                    }
                    return Ok(Self { file, mode });
                }
                Err(err) if is_contended(&err) => {
                    if start.elapsed() >= config.timeout {
                        return Err(LogError::LockTimeout {
                            mode,
                            timeout: config.timeout,
                        });
                    }
                    trace!(%mode, attempts, "Lock contended, retrying");
                    thread::sleep(config.retry_interval);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    /// Mode this lock was acquired with
    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(self.file) {
            warn!(mode = %self.mode, error = %e, "Failed to release file lock");
        }
    }
}

// Called through the trait path: std's inherent `File` lock methods share these names.
fn try_lock(file: &File, mode: LockMode) -> io::Result<()> {
    match mode {
        LockMode::Shared => FileExt::try_lock_shared(file),
        LockMode::Exclusive => FileExt::try_lock_exclusive(file),
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs4::lock_contended_error().raw_os_error()
}
