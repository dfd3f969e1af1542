//! Configuration for writers, readers and the advisory lock

use std::time::Duration;

use flate2::Compression;

/// Bounded retry settings for advisory lock acquisition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockConfig {
    /// Give up after this long without obtaining the lock
    pub timeout: Duration,
    /// Sleep between two acquisition attempts
    pub retry_interval: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            retry_interval: Duration::from_millis(250),
        }
    }
}

impl LockConfig {
    /// Override the acquisition timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the retry interval
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }
}

/// Configuration for a [`Writer`](crate::Writer)
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Lock settings used while appending a block
    pub lock: LockConfig,
    /// Whether to `sync_data` after the payload write and after the commit flip
    pub sync_on_commit: bool,
    /// Gzip level for block payloads
    pub compression: Compression,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            sync_on_commit: true,
            compression: Compression::default(),
        }
    }
}

impl WriterConfig {
    /// Override the lock settings
    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    /// Enable or disable syncing on commit
    pub fn with_sync_on_commit(mut self, sync_on_commit: bool) -> Self {
        self.sync_on_commit = sync_on_commit;
        self
    }
}

/// Configuration for block scanning and follow mode
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    /// Lock settings used per block read
    pub lock: LockConfig,
    /// How long follow mode waits after reaching end of file
    pub check_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            lock: LockConfig::default(),
            check_interval: Duration::from_secs(1),
        }
    }
}

impl ReaderConfig {
    /// Override the lock settings
    pub fn with_lock(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    /// Override the follow-mode check interval
    pub fn with_check_interval(mut self, check_interval: Duration) -> Self {
        self.check_interval = check_interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let lock = LockConfig::default();
        assert_eq!(lock.timeout, Duration::from_secs(5));
        assert_eq!(lock.retry_interval, Duration::from_millis(250));

        let writer = WriterConfig::default();
        assert!(writer.sync_on_commit);

        let reader = ReaderConfig::default();
        assert_eq!(reader.check_interval, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let reader = ReaderConfig::default()
            .with_check_interval(Duration::from_millis(20))
            .with_lock(LockConfig::default().with_timeout(Duration::from_millis(100)));
        assert_eq!(reader.check_interval, Duration::from_millis(20));
        assert_eq!(reader.lock.timeout, Duration::from_millis(100));
        assert_eq!(reader.lock.retry_interval, Duration::from_millis(250));
    }
}
