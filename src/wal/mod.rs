//! Write-ahead log
//!
//! Every engine mutation is appended here, and synced per the configured
//! [`WalSyncStrategy`](crate::config::WalSyncStrategy), before the memtable
//! sees it. An insert is one `Operation::Batch` frame, so replay restores a
//! record and its index entries together or not at all.
//!
//! ## Frame layout
//! ```text
//!   ┌──────────┬──────────┬──────────┬───────────────────────────┐
//!   │ LSN (8)  │ CRC (4)  │ Len (4)  │ bincode(operation, ts)    │
//!   └──────────┴──────────┴──────────┴───────────────────────────┘
//!   integers little-endian; the CRC covers the payload bytes
//! ```
//!
//! Frames follow each other with no padding. Recovery keeps the longest
//! valid prefix and cuts the file there.

mod entry;
mod writer;
mod reader;
mod recovery;

pub use entry::{WalEntry, Operation, HEADER_SIZE};
pub use writer::WalWriter;
pub use reader::{WalReader, WalIterator};
pub use recovery::{WalRecovery, RecoveryResult};
