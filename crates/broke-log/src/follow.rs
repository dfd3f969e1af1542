//! Follow mode: tail a log file for newly committed blocks

use std::fs::File;
use std::thread;

use tracing::trace;

use crate::config::ReaderConfig;
use crate::error::Result;
use crate::message::Message;
use crate::reader::Messages;

/// Endless stream of messages from a log file.
///
/// Drains everything up to the current end of file, sleeps for
/// `check_interval`, then resumes from where the file handle stopped, so no
/// message is yielded twice. It only ends after yielding an error; otherwise
/// the consumer stops it by no longer pulling.
#[derive(Debug)]
pub struct Follow<'f> {
    file: &'f File,
    config: ReaderConfig,
    current: Messages<'f>,
    failed: bool,
}

impl<'f> Follow<'f> {
    /// Follow `file` from its current position
    pub fn new(file: &'f File, config: ReaderConfig) -> Self {
        Self {
            file,
            config,
            current: Messages::new(file, config),
            failed: false,
        }
    }
}

impl Iterator for Follow<'_> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            match self.current.next() {
                Some(Ok(message)) => return Some(Ok(message)),
                Some(Err(e)) => {
                    self.failed = true;
                    return Some(Err(e));
                }
                None => {
                    trace!(interval = ?self.config.check_interval, "Reached end of log, waiting");
                    thread::sleep(self.config.check_interval);
                    self.current = Messages::new(self.file, self.config);
                }
            }
        }
    }
}

/// Follow `file` for new messages, starting at its current position
pub fn follow_messages(file: &File, config: ReaderConfig) -> Follow<'_> {
    Follow::new(file, config)
}
