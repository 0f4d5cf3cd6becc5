//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Track size for flush triggers
//! - Ordered iteration for SSTable creation
//! - O(1) snapshots for consistent scans
//!
//! ## Data Structure Choice
//! A `BTreeMap` behind an `Arc`, wrapped in an RwLock:
//! - Ordered keys (required for SSTable generation and scans)
//! - Readers take a snapshot by cloning the `Arc`
//! - Writers mutate through `Arc::make_mut`, which copies the map only while
//!   a snapshot of the current version is still alive

mod table;

pub use table::{MemTable, MemTableIterator, MemTableSnapshot};

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// Approximate in-memory footprint of the entry payload
    pub(crate) fn payload_size(&self) -> usize {
        match self {
            MemTableEntry::Value(v) => v.len(),
            MemTableEntry::Tombstone => 0,
        }
    }
}
