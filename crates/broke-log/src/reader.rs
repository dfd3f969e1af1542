//! Message-level reads: block scan chained with message decoding

use std::fs::File;
use std::io::Cursor;

use bytes::Bytes;
use flate2::read::MultiGzDecoder;

use crate::config::ReaderConfig;
use crate::error::{LogError, Result};
use crate::message::{Message, MessageDecoder};
use crate::scanner::BlockScanner;

type BlockMessages = MessageDecoder<MultiGzDecoder<Cursor<Bytes>>>;

/// All messages of all committed blocks between the file handle's current
/// position and its current end of file, in append order.
///
/// The first error ends the iteration.
#[derive(Debug)]
pub struct Messages<'f> {
    blocks: BlockScanner<'f>,
    current: Option<BlockMessages>,
    done: bool,
}

impl<'f> Messages<'f> {
    /// Read messages from `file`, starting at its current position
    pub fn new(file: &'f File, config: ReaderConfig) -> Self {
        Self {
            blocks: BlockScanner::new(file, config.lock),
            current: None,
            done: false,
        }
    }

    fn fail<T>(&mut self, err: LogError) -> Option<Result<T>> {
        self.done = true;
        Some(Err(err))
    }
}

impl Iterator for Messages<'_> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.done {
                return None;
            }

            if let Some(decoder) = self.current.as_mut() {
                match decoder.next() {
                    Some(Ok(message)) => return Some(Ok(message)),
                    Some(Err(e)) => return self.fail(e),
                    None => self.current = None,
                }
            }

            match self.blocks.next()? {
                Ok(block) => {
                    let stream = MultiGzDecoder::new(Cursor::new(block));
                    self.current = Some(MessageDecoder::new(stream));
                }
                Err(e) => return self.fail(e),
            }
        }
    }
}

/// Read every message committed so far, starting at the file handle's
/// current position
pub fn read_messages(file: &File, config: ReaderConfig) -> Messages<'_> {
    Messages::new(file, config)
}
