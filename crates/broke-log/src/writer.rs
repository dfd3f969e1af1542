//! Buffered block writer
//!
//! A [`Writer`] collects messages into an in-memory gzip stream. `commit`
//! appends the stream as one block using a two-phase protocol: the header is
//! written with `committed = false`, followed by the payload, and only then is
//! the header rewritten with `committed = true`. Readers skip blocks whose flag
//! was never flipped, so a crash mid-append never exposes partial data.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::thread;

use flate2::Compression;
use flate2::write::GzEncoder;
use tracing::{debug, error, info, instrument, warn};

use crate::config::WriterConfig;
use crate::error::{LogError, Result};
use crate::header::{BLOCK_HEADER_SIZE, BlockHeader};
use crate::lock::{FileLock, LockMode};
use crate::message::write_framed;

/// How a write scope ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Flush buffered messages as a block
    Success,
    /// Discard buffered messages
    Failure,
}

/// Location of a block appended by [`Writer::commit`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommittedBlock {
    /// File offset of the block header
    pub offset: u64,
    /// Compressed payload length
    pub length: u32,
    /// Number of messages in the block
    pub messages: usize,
}

impl CommittedBlock {
    /// Bytes the block occupies on disk, header included
    pub fn size(&self) -> u64 {
        BLOCK_HEADER_SIZE as u64 + u64::from(self.length)
    }
}

/// Accumulates messages and appends them to a log file as atomic blocks.
///
/// One live writer per file per process is assumed; the advisory lock taken
/// during `commit` is what keeps writers in different processes apart.
///
/// Dropping a dirty writer commits it, unless the thread is unwinding from a
/// panic, in which case the buffer is rolled back. Commit errors during drop
/// can only be logged; call [`Writer::close`] to observe them.
pub struct Writer {
    path: PathBuf,
    config: WriterConfig,
    buffer: GzEncoder<Vec<u8>>,
    pending: usize,
}

impl Writer {
    /// Create a writer for the log file at `path` with default settings.
    ///
    /// No I/O happens until the first non-empty `commit`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self::with_config(path, WriterConfig::default())
    }

    /// Create a writer with custom settings
    pub fn with_config(path: impl AsRef<Path>, config: WriterConfig) -> Self {
        let buffer = new_buffer(config.compression);
        Self {
            path: path.as_ref().to_path_buf(),
            config,
            buffer,
            pending: 0,
        }
    }

    /// Run `f` against a fresh writer, committing if it returns `Ok` and
    /// rolling back if it returns `Err`.
    pub fn scoped<T, E, F>(path: impl AsRef<Path>, config: WriterConfig, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut Writer) -> Result<T, E>,
        E: From<LogError>,
    {
        let mut writer = Self::with_config(path, config);
        match f(&mut writer) {
            Ok(value) => {
                writer.close(Outcome::Success)?;
                Ok(value)
            }
            Err(e) => {
                writer.rollback();
                Err(e)
            }
        }
    }

    /// Path of the target log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether messages were stored since the last commit or rollback
    pub fn dirty(&self) -> bool {
        self.pending > 0
    }

    /// Number of messages buffered since the last commit or rollback
    pub fn pending(&self) -> usize {
        self.pending
    }

    /// Buffer a message, stamped with the current wall-clock time.
    ///
    /// # Errors
    ///
    /// `Validation` if the topic is not ASCII, contains NUL, is longer than
    /// 64 bytes, or the payload does not fit a 32-bit length. The buffer is unchanged then.
    pub fn store(&mut self, topic: &str, payload: impl AsRef<[u8]>) -> Result<()> {
        let timestamp = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
        write_framed(&mut self.buffer, topic, timestamp, payload.as_ref())?;
        self.pending += 1;
        Ok(())
    }

    /// Discard everything buffered since the last commit
    pub fn rollback(&mut self) {
        if self.dirty() {
            debug!(messages = self.pending, "Rolling back buffered messages");
        }
        self.buffer = new_buffer(self.config.compression);
        self.pending = 0;
    }

    /// Append buffered messages to the log file as one committed block.
    ///
    /// Returns `Ok(None)` without touching the file when nothing is buffered.
    /// The buffer is reset before the file is locked, so messages stored after
    /// a failed commit start a new block.
    ///
    /// # Errors
    ///
    /// `LockTimeout` if the exclusive lock is not obtained in time, `Io` for
    /// write failures. If truncating a partially written block also fails the
    /// result is `RecoveryFailed`, carrying the append error as its source.
    #[instrument(skip_all, fields(path = %self.path.display()))]
    pub fn commit(&mut self) -> Result<Option<CommittedBlock>> {
        if !self.dirty() {
            return Ok(None);
        }

        let messages = self.pending;
        let encoder = std::mem::replace(&mut self.buffer, new_buffer(self.config.compression));
        self.pending = 0;

        let compressed = encoder.finish()?;
        let checksum = crc32fast::hash(&compressed);
        let length = u32::try_from(compressed.len()).map_err(|_| {
            LogError::validation(format!(
                "compressed block is {} bytes, at most {} allowed",
                compressed.len(),
                u32::MAX
            ))
        })?;
        let header = BlockHeader::uncommitted(length, checksum);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)?;
        let _lock = FileLock::acquire(&file, LockMode::Exclusive, &self.config.lock)?;

        let start = (&file).seek(SeekFrom::End(0))?;
        if let Err(e) = self.append(&file, start, header, &compressed) {
            return Err(recover(&file, start, e));
        }

        let block = CommittedBlock {
            offset: start,
            length,
            messages,
        };
        info!(offset = start, length, messages, "Committed block");
        Ok(Some(block))
    }

    /// Finalize the writer: commit on success, roll back on failure
    pub fn close(mut self, outcome: Outcome) -> Result<Option<CommittedBlock>> {
        match outcome {
            Outcome::Success => self.commit(),
            Outcome::Failure => {
                self.rollback();
                Ok(None)
            }
        }
    }

    fn append(
        &self,
        file: &File,
        start: u64,
        mut header: BlockHeader,
        compressed: &[u8],
    ) -> Result<()> {
        let mut fp = file;

        fp.write_all(&header.encode())?;
        fp.write_all(compressed)?;
        fp.flush()?;
        if self.config.sync_on_commit {
            file.sync_data()?;
        }

        header.committed = true;
        fp.seek(SeekFrom::Start(start))?;
        fp.write_all(&header.encode())?;
        fp.flush()?;
        if self.config.sync_on_commit {
            file.sync_data()?;
        }
        Ok(())
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if !self.dirty() {
            return;
        }
        if thread::panicking() {
            self.rollback();
        } else if let Err(e) = self.commit() {
            error!(path = %self.path.display(), error = %e, "Commit on drop failed");
        }
    }
}

impl fmt::Debug for Writer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Writer")
            .field("path", &self.path)
            .field("pending", &self.pending)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn new_buffer(level: Compression) -> GzEncoder<Vec<u8>> {
    GzEncoder::new(Vec::new(), level)
}

/// Best-effort removal of a partially appended block
fn recover(file: &File, start: u64, err: LogError) -> LogError {
    match file.set_len(start) {
        Ok(()) => {
            warn!(offset = start, error = %err, "Append failed, truncated partial block");
            err
        }
        Err(truncate) => {
            error!(
                offset = start,
                error = %err,
                truncate_error = %truncate,
                "Append failed and the partial block could not be truncated"
            );
            LogError::RecoveryFailed {
                source: Box::new(err),
                offset: start,
                truncate,
            }
        }
    }
}
