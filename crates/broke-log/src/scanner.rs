//! Sequential scan over committed blocks
//!
//! The shared lock is taken per block, covering one header read plus at most
//! one payload read, so writers can append between two blocks of a scan.

use std::fs::File;
use std::io::{Seek, SeekFrom};

use bytes::Bytes;
use tracing::{trace, warn};

use crate::config::LockConfig;
use crate::error::{LogError, Result};
use crate::header::{BLOCK_HEADER_SIZE, BlockHeader};
use crate::lock::{FileLock, LockMode};
use crate::util::{read_fully, read_up_to};

/// Yields the compressed payload of each committed block, starting at the
/// file handle's current position and ending at its current end of file.
///
/// Empty blocks and blocks whose committed flag was never set are skipped.
/// Integrity failures (bad magic, short read, checksum mismatch) are yielded
/// once and end the scan.
#[derive(Debug)]
pub struct BlockScanner<'f> {
    file: &'f File,
    lock: LockConfig,
    done: bool,
}

impl<'f> BlockScanner<'f> {
    /// Scan `file` from its current position
    pub fn new(file: &'f File, lock: LockConfig) -> Self {
        Self {
            file,
            lock,
            done: false,
        }
    }

    fn next_block(&mut self) -> Result<Option<Bytes>> {
        loop {
            let _lock = FileLock::acquire(self.file, LockMode::Shared, &self.lock)?;
            let mut fp = self.file;
            let offset = fp.stream_position()?;

            let mut buf = [0u8; BLOCK_HEADER_SIZE];
            let read = read_up_to(&mut fp, &mut buf)?;
            if read == 0 {
                return Ok(None);
            }
            let header = BlockHeader::decode(&buf[..read])?;

            if header.length == 0 {
                warn!(offset, "Found empty block, skipping");
                continue;
            }

            if !header.committed {
                warn!(offset, length = header.length, "Found non-committed block, skipping");
                fp.seek(SeekFrom::Current(i64::from(header.length)))?;
                continue;
            }

            let block = read_fully(&mut fp, header.length as usize)?;
            let actual = crc32fast::hash(&block);
            if actual != header.checksum {
                return Err(LogError::Checksum {
                    expected: header.checksum,
                    actual,
                });
            }

            trace!(offset, length = header.length, "Read block");
            return Ok(Some(Bytes::from(block)));
        }
    }
}

impl Iterator for BlockScanner<'_> {
    type Item = Result<Bytes>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_block() {
            Ok(Some(block)) => Some(Ok(block)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::TempDir;

    use super::*;

    fn block(payload: &[u8], committed: bool) -> Vec<u8> {
        let header = BlockHeader {
            length: payload.len() as u32,
            checksum: crc32fast::hash(payload),
            committed,
        };
        let mut out = header.encode().to_vec();
        out.extend_from_slice(payload);
        out
    }

    fn scan(raw: &[u8]) -> Vec<Result<Bytes>> {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("scan.broke");
        File::create(&path).unwrap().write_all(raw).unwrap();
        let file = File::open(&path).unwrap();
        BlockScanner::new(&file, LockConfig::default()).collect()
    }

    #[test]
    fn test_empty_file() {
        assert!(scan(b"").is_empty());
    }

    #[test]
    fn test_yields_committed_blocks_in_order() {
        let mut raw = block(b"one", true);
        raw.extend(block(b"two", true));

        let blocks: Vec<Bytes> = scan(&raw).into_iter().map(|b| b.unwrap()).collect();
        assert_eq!(blocks, vec![Bytes::from_static(b"one"), Bytes::from_static(b"two")]);
    }

    #[test]
    fn test_skips_uncommitted_and_empty_blocks() {
        let mut raw = block(b"before", true);
        raw.extend(block(b"crashed", false));
        raw.extend(BlockHeader::uncommitted(0, 0).encode());
        raw.extend(block(b"after", true));

        let blocks: Vec<Bytes> = scan(&raw).into_iter().map(|b| b.unwrap()).collect();
        assert_eq!(
            blocks,
            vec![Bytes::from_static(b"before"), Bytes::from_static(b"after")]
        );
    }

    #[test]
    fn test_checksum_mismatch_ends_scan() {
        let mut raw = block(b"payload", true);
        raw.extend(block(b"next", true));
        raw[BLOCK_HEADER_SIZE] ^= 0xFF;

        let results = scan(&raw);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(LogError::Checksum { .. })));
    }

    #[test]
    fn test_bad_magic_is_fatal() {
        let mut raw = block(b"payload", true);
        raw[3] = b'!';

        let results = scan(&raw);
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(LogError::Format(_))));
    }

    #[test]
    fn test_truncated_payload_is_short_read() {
        let mut raw = block(b"payload", true);
        raw.truncate(raw.len() - 3);

        let results = scan(&raw);
        assert!(matches!(
            results.as_slice(),
            [Err(LogError::ShortRead {
                expected: 7,
                actual: 4
            })]
        ));
    }

    #[test]
    fn test_corrupted_length_is_short_read() {
        let raw = BlockHeader {
            length: u32::MAX,
            checksum: 0,
            committed: true,
        }
        .encode();

        let results = scan(&raw);
        assert!(matches!(
            results.as_slice(),
            [Err(LogError::ShortRead { expected, actual: 0 })] if *expected == u32::MAX as usize
        ));
    }

    #[test]
    fn test_trailing_uncommitted_block_past_eof() {
        let mut raw = block(b"kept", true);
        let mut crashed = block(b"half written", false);
        crashed.truncate(BLOCK_HEADER_SIZE + 4);
        raw.extend(crashed);

        let results = scan(&raw);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].as_ref().unwrap(), &Bytes::from_static(b"kept"));
    }
}
