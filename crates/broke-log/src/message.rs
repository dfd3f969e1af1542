//! Messages and their framing inside a decompressed block
//!
//! A decompressed block is a plain concatenation of
//! `MessageHeader | payload` records; the end of the stream ends the block.

use std::fmt;
use std::io::{Read, Write};

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};

use crate::error::{LogError, Result};
use crate::header::{MESSAGE_HEADER_SIZE, MessageHeader};
use crate::util::{read_fully, read_up_to};

/// One topic-tagged payload read back from the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// ASCII topic, null padding removed
    pub topic: String,
    /// Capture time in milliseconds since the Unix epoch
    pub time: u64,
    /// Raw payload bytes
    pub payload: Bytes,
}

impl Message {
    /// Capture time as a UTC timestamp, if it is representable
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        let millis = i64::try_from(self.time).ok()?;
        Utc.timestamp_millis_opt(millis).single()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Message(topic={:?}, time={}, payload={} bytes)",
            self.topic,
            self.time,
            self.payload.len()
        )
    }
}

/// Write one framed message (header followed by payload) into `out`.
///
/// Validation happens before anything is written, so a rejected message
/// leaves `out` untouched.
pub(crate) fn write_framed<W: Write>(
    out: &mut W,
    topic: &str,
    timestamp: u64,
    payload: &[u8],
) -> Result<()> {
    let length = u32::try_from(payload.len()).map_err(|_| {
        LogError::validation(format!(
            "payload is {} bytes, at most {} allowed",
            payload.len(),
            u32::MAX
        ))
    })?;

    let header = MessageHeader {
        length,
        timestamp,
        topic: topic.to_string(),
    }
    .encode()?;

    out.write_all(&header)?;
    out.write_all(payload)?;
    Ok(())
}

/// Decodes messages from one block's decompressed byte stream.
///
/// Finite: ends cleanly at end of stream. Any error ends the iteration.
#[derive(Debug)]
pub struct MessageDecoder<R> {
    reader: R,
    done: bool,
}

impl<R: Read> MessageDecoder<R> {
    /// Decode messages from `reader`
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            done: false,
        }
    }

    fn next_message(&mut self) -> Result<Option<Message>> {
        let mut buf = [0u8; MESSAGE_HEADER_SIZE];
        let read = read_up_to(&mut self.reader, &mut buf)?;
        if read == 0 {
            return Ok(None);
        }

        let header = MessageHeader::decode(&buf[..read])?;
        let payload = read_fully(&mut self.reader, header.length as usize)?;

        Ok(Some(Message {
            topic: header.topic,
            time: header.timestamp,
            payload: Bytes::from(payload),
        }))
    }
}

impl<R: Read> Iterator for MessageDecoder<R> {
    type Item = Result<Message>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_message() {
            Ok(Some(message)) => Some(Ok(message)),
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
