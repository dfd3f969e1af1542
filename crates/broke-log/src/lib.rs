//! # Broke Log
//!
//! A very simple event broker/queue on top of flat files.
//!
//! Producers append topic-tagged byte messages; messages are batched and
//! gzip-compressed into blocks, and every block is appended atomically.
//! Consumers scan committed blocks sequentially or follow the file for new
//! ones. The file itself, shared between processes, is the only interface.
//!
//! ## Features
//!
//! - **Writer**: buffers messages, commits them as one checksummed block
//! - **Two-phase commit**: header written uncommitted, flipped after the payload
//! - **BlockScanner**: per-block shared locking, skips crashed appends
//! - **Follow**: polls the file for newly committed blocks
//! - **Advisory locks**: exclusive for commits, shared for reads, bounded retry
//!
//! ## File Format
//!
//! ```text
//! [BlockHeader 36B][gzip payload][BlockHeader 36B][gzip payload]...
//! ```
//!
//! A decompressed payload is a sequence of `[MessageHeader 84B][payload]`
//! records. See [`header`] for the exact layouts.
//!
//! Locks are advisory and not reliable on network filesystems.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::fs::File;
//!
//! use broke_log::{ReaderConfig, Writer, read_messages};
//!
//! # fn main() -> broke_log::Result<()> {
//! let mut writer = Writer::new("events.broke");
//! writer.store("clicks", b"button=buy")?;
//! writer.store("views", b"page=/home")?;
//! writer.commit()?;
//!
//! let file = File::open("events.broke")?;
//! for message in read_messages(&file, ReaderConfig::default()) {
//!     println!("{}", message?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod follow;
pub mod header;
pub mod lock;
pub mod message;
pub mod reader;
pub mod scanner;
pub mod writer;

mod util;

// Re-exports
pub use config::{LockConfig, ReaderConfig, WriterConfig};
pub use error::{LogError, Result};
pub use follow::{Follow, follow_messages};
pub use header::{BlockHeader, MAX_TOPIC_LEN, MessageHeader};
pub use lock::{FileLock, LockMode};
pub use message::{Message, MessageDecoder};
pub use reader::{Messages, read_messages};
pub use scanner::BlockScanner;
pub use writer::{CommittedBlock, Outcome, Writer};
