//! Fixed-layout block and message headers
//!
//! All integers are little-endian.
//!
//! ```text
//! BlockHeader   (36 bytes)
//!   magic[11] = "BrokeHeader" | length: u32 | checksum: u32 | committed: u8 | reserved[16] = 0
//!
//! MessageHeader (84 bytes)
//!   reserved[8] = 0 | length: u32 | timestamp: u64 (ms) | topic: ascii[64], null padded
//! ```

use crate::error::{LogError, Result};

/// Magic constant at the start of every block header
pub const BLOCK_MAGIC: &[u8; 11] = b"BrokeHeader";

/// Encoded size of a [`BlockHeader`]
pub const BLOCK_HEADER_SIZE: usize = 36;

/// Encoded size of a [`MessageHeader`]
pub const MESSAGE_HEADER_SIZE: usize = 84;

/// Longest topic that fits into a message header, in bytes
pub const MAX_TOPIC_LEN: usize = 64;

const BLOCK_RESERVED: usize = 16;
const MESSAGE_RESERVED: usize = 8;

// Offsets inside the block header.
const LENGTH_AT: usize = 11;
const CHECKSUM_AT: usize = 15;
/// Offset of the committed flag inside an encoded block header
pub const COMMITTED_AT: usize = 19;
const BLOCK_RESERVED_AT: usize = 20;

// Offsets inside the message header.
const MESSAGE_LENGTH_AT: usize = 8;
const TIMESTAMP_AT: usize = 12;
const TOPIC_AT: usize = 20;

/// Header preceding every block in the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    /// Byte count of the compressed payload that follows
    pub length: u32,
    /// CRC-32 over the compressed payload
    pub checksum: u32,
    /// Whether the block was completely written
    pub committed: bool,
}

impl BlockHeader {
    /// Header for a payload that has not been committed yet
    pub fn uncommitted(length: u32, checksum: u32) -> Self {
        Self {
            length,
            checksum,
            committed: false,
        }
    }

    /// Encode into the on-disk layout
    pub fn encode(&self) -> [u8; BLOCK_HEADER_SIZE] {
        let mut buf = [0u8; BLOCK_HEADER_SIZE];
        buf[..LENGTH_AT].copy_from_slice(BLOCK_MAGIC);
        buf[LENGTH_AT..CHECKSUM_AT].copy_from_slice(&self.length.to_le_bytes());
        buf[CHECKSUM_AT..COMMITTED_AT].copy_from_slice(&self.checksum.to_le_bytes());
        buf[COMMITTED_AT] = u8::from(self.committed);
        buf
    }

    /// Decode from the on-disk layout.
    ///
    /// # Errors
    ///
    /// `ShortRead` if `buf` is shorter than a header, `Format` if the magic or
    /// the reserved bytes are wrong.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let buf = exact::<BLOCK_HEADER_SIZE>(buf)?;

        if &buf[..LENGTH_AT] != BLOCK_MAGIC {
            return Err(LogError::format(format!(
                "bad block magic {:?}",
                String::from_utf8_lossy(&buf[..LENGTH_AT])
            )));
        }
        if buf[BLOCK_RESERVED_AT..] != [0u8; BLOCK_RESERVED] {
            return Err(LogError::format("non-zero reserved bytes in block header"));
        }

        Ok(Self {
            length: u32_at(buf, LENGTH_AT),
            checksum: u32_at(buf, CHECKSUM_AT),
            committed: buf[COMMITTED_AT] == 1,
        })
    }
}

/// Header preceding every message inside a decompressed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    /// Payload length in bytes
    pub length: u32,
    /// Capture time in milliseconds since the Unix epoch
    pub timestamp: u64,
    /// ASCII topic, at most [`MAX_TOPIC_LEN`] bytes
    pub topic: String,
}

impl MessageHeader {
    /// Encode into the on-disk layout.
    ///
    /// # Errors
    ///
    /// `Validation` if the topic is not ASCII or longer than [`MAX_TOPIC_LEN`].
    pub fn encode(&self) -> Result<[u8; MESSAGE_HEADER_SIZE]> {
        validate_topic(&self.topic)?;

        let mut buf = [0u8; MESSAGE_HEADER_SIZE];
        buf[MESSAGE_LENGTH_AT..TIMESTAMP_AT].copy_from_slice(&self.length.to_le_bytes());
        buf[TIMESTAMP_AT..TOPIC_AT].copy_from_slice(&self.timestamp.to_le_bytes());
        buf[TOPIC_AT..TOPIC_AT + self.topic.len()].copy_from_slice(self.topic.as_bytes());
        Ok(buf)
    }

    /// Decode from the on-disk layout, trimming the topic's null padding.
    ///
    /// # Errors
    ///
    /// `ShortRead` if `buf` is shorter than a header, `Format` if the reserved
    /// bytes are non-zero or the topic is not ASCII.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        let buf = exact::<MESSAGE_HEADER_SIZE>(buf)?;

        if buf[..MESSAGE_LENGTH_AT] != [0u8; MESSAGE_RESERVED] {
            return Err(LogError::format("non-zero reserved bytes in message header"));
        }

        let raw_topic = &buf[TOPIC_AT..];
        let end = raw_topic
            .iter()
            .rposition(|&b| b != 0)
            .map_or(0, |last| last + 1);
        let topic = &raw_topic[..end];
        if !topic.is_ascii() {
            return Err(LogError::format("message topic is not ASCII"));
        }

        Ok(Self {
            length: u32_at(buf, MESSAGE_LENGTH_AT),
            timestamp: u64_at(buf, TIMESTAMP_AT),
            // ASCII was checked above, so this never replaces anything.
            topic: String::from_utf8_lossy(topic).into_owned(),
        })
    }
}

/// Check that `topic` can be stored in a message header.
///
/// NUL is rejected because it is the on-disk padding byte and would not
/// survive a round trip.
pub fn validate_topic(topic: &str) -> Result<()> {
    if !topic.is_ascii() {
        return Err(LogError::validation(format!(
            "topic {topic:?} is not ASCII"
        )));
    }
    if topic.contains('\0') {
        return Err(LogError::validation(format!(
            "topic {topic:?} contains a NUL byte"
        )));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(LogError::validation(format!(
            "topic is {} bytes, at most {MAX_TOPIC_LEN} allowed",
            topic.len()
        )));
    }
    Ok(())
}

fn exact<const N: usize>(buf: &[u8]) -> Result<&[u8; N]> {
    buf.get(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or(LogError::ShortRead {
            expected: N,
            actual: buf.len(),
        })
}

fn u32_at(buf: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn u64_at(buf: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_header_layout() {
        let header = BlockHeader {
            length: 0x0102_0304,
            checksum: 0xAABB_CCDD,
            committed: true,
        };
        let buf = header.encode();

        assert_eq!(&buf[..11], b"BrokeHeader");
        assert_eq!(&buf[11..15], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[15..19], &[0xDD, 0xCC, 0xBB, 0xAA]);
        assert_eq!(buf[19], 1);
        assert_eq!(&buf[20..], &[0u8; 16]);

        assert_eq!(BlockHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_uncommitted_flag() {
        let buf = BlockHeader::uncommitted(10, 99).encode();
        assert_eq!(buf[COMMITTED_AT], 0);
        assert!(!BlockHeader::decode(&buf).unwrap().committed);
    }

    #[test]
    fn test_bad_magic_is_format_error() {
        let mut buf = BlockHeader::uncommitted(1, 1).encode();
        buf[0] = b'b';
        let err = BlockHeader::decode(&buf).unwrap_err();
        assert!(matches!(err, LogError::Format(_)));
    }

    #[test]
    fn test_reserved_bytes_must_be_zero() {
        let mut buf = BlockHeader::uncommitted(1, 1).encode();
        buf[BLOCK_HEADER_SIZE - 1] = 7;
        assert!(matches!(
            BlockHeader::decode(&buf),
            Err(LogError::Format(_))
        ));
    }

    #[test]
    fn test_short_block_header() {
        let buf = BlockHeader::uncommitted(1, 1).encode();
        match BlockHeader::decode(&buf[..20]) {
            Err(LogError::ShortRead { expected, actual }) => {
                assert_eq!(expected, BLOCK_HEADER_SIZE);
                assert_eq!(actual, 20);
            }
            other => panic!("expected ShortRead, got {other:?}"),
        }
    }

    #[test]
    fn test_message_header_layout() {
        let header = MessageHeader {
            length: 3,
            timestamp: 1_700_000_000_123,
            topic: "orders".to_string(),
        };
        let buf = header.encode().unwrap();

        assert_eq!(&buf[..8], &[0u8; 8]);
        assert_eq!(&buf[8..12], &3u32.to_le_bytes());
        assert_eq!(&buf[12..20], &1_700_000_000_123u64.to_le_bytes());
        assert_eq!(&buf[20..26], b"orders");
        assert!(buf[26..].iter().all(|&b| b == 0));

        assert_eq!(MessageHeader::decode(&buf).unwrap(), header);
    }

    #[test]
    fn test_full_width_topic() {
        let header = MessageHeader {
            length: 0,
            timestamp: 0,
            topic: "t".repeat(MAX_TOPIC_LEN),
        };
        let decoded = MessageHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded.topic.len(), MAX_TOPIC_LEN);
    }

    #[test]
    fn test_topic_validation() {
        assert!(validate_topic("").is_ok());
        assert!(validate_topic(&"a".repeat(64)).is_ok());
        assert!(matches!(
            validate_topic(&"a".repeat(65)),
            Err(LogError::Validation(_))
        ));
        assert!(matches!(
            validate_topic("caf\u{e9}"),
            Err(LogError::Validation(_))
        ));
    }

    #[test]
    fn test_nul_in_topic_rejected() {
        assert!(matches!(validate_topic("a\0"), Err(LogError::Validation(_))));
        assert!(matches!(validate_topic("\0a"), Err(LogError::Validation(_))));
    }

    #[test]
    fn test_message_reserved_bytes_must_be_zero() {
        let mut buf = MessageHeader {
            length: 1,
            timestamp: 1,
            topic: "x".to_string(),
        }
        .encode()
        .unwrap();
        buf[0] = 1;
        assert!(matches!(
            MessageHeader::decode(&buf),
            Err(LogError::Format(_))
        ));
    }
}
