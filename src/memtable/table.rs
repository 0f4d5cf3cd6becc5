//! MemTable implementation
//!
//! Copy-on-write BTreeMap memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::wal::Operation;

use super::MemTableEntry;

type Table = BTreeMap<Vec<u8>, MemTableEntry>;

/// In-memory table for recent writes
pub struct MemTable {
    /// Current version of the table
    data: RwLock<Arc<Table>>,
    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Arc::new(BTreeMap::new())),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair, returning the new approximate size
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        let mut data = self.data.write();
        let table = Arc::make_mut(&mut data);
        self.insert(table, key, MemTableEntry::Value(value))
    }

    /// Delete a key (inserts tombstone), returning the new approximate size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        let mut data = self.data.write();
        let table = Arc::make_mut(&mut data);
        self.insert(table, key, MemTableEntry::Tombstone)
    }

    /// Apply a logged operation under a single write lock
    ///
    /// Readers observe either none or all of a batch.
    pub fn apply(&self, operation: Operation) -> usize {
        let mut data = self.data.write();
        let table = Arc::make_mut(&mut data);
        self.apply_to(table, operation);
        self.size.load(Ordering::Acquire)
    }

    fn apply_to(&self, table: &mut Table, operation: Operation) {
        match operation {
            Operation::Put { key, value } => {
                self.insert(table, key, MemTableEntry::Value(value));
            }
            Operation::Delete { key } => {
                self.insert(table, key, MemTableEntry::Tombstone);
            }
            Operation::Batch { ops } => {
                for op in ops {
                    self.apply_to(table, op);
                }
            }
        }
    }

    fn insert(&self, table: &mut Table, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let added = key.len() + entry.payload_size();
        let removed = match table.get(&key) {
            Some(old) => key.len() + old.payload_size(),
            None => 0,
        };
        table.insert(key, entry);

        // Writers are serialized by the write lock, so load/store is exact
        let size = self.size.load(Ordering::Acquire) + added - removed;
        self.size.store(size, Ordering::Release);
        size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    /// True when there is nothing to flush
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Take a point-in-time view of the table
    pub fn snapshot(&self) -> MemTableSnapshot {
        MemTableSnapshot {
            table: Arc::clone(&self.data.read()),
        }
    }

    /// Get an iterator over all entries (for flush)
    /// Returns entries in sorted key order
    pub fn iter(&self) -> MemTableIterator {
        self.snapshot().into_iter()
    }

    /// Clear all entries (after successful flush)
    ///
    /// Outstanding snapshots keep the old version alive.
    pub fn clear(&self) {
        let mut data = self.data.write();
        *data = Arc::new(BTreeMap::new());
        self.size.store(0, Ordering::Release);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Immutable view of the memtable at one instant
#[derive(Clone)]
pub struct MemTableSnapshot {
    table: Arc<Table>,
}

impl MemTableSnapshot {
    /// Look up a key in this version
    pub fn get(&self, key: &[u8]) -> Option<&MemTableEntry> {
        self.table.get(key)
    }

    /// First entry whose key is `>= start` (or `> start` when `exclusive`)
    pub fn seek(&self, start: &[u8], exclusive: bool) -> Option<(&[u8], &MemTableEntry)> {
        let lower = if exclusive {
            Bound::Excluded(start)
        } else {
            Bound::Included(start)
        };
        self.table
            .range::<[u8], _>((lower, Bound::Unbounded))
            .next()
            .map(|(k, v)| (k.as_slice(), v))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

impl IntoIterator for MemTableSnapshot {
    type Item = (Vec<u8>, MemTableEntry);
    type IntoIter = MemTableIterator;

    fn into_iter(self) -> MemTableIterator {
        let entries: Vec<_> = self
            .table
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        MemTableIterator {
            inner: entries.into_iter(),
        }
    }
}

/// Iterator over MemTable entries
pub struct MemTableIterator {
    inner: std::vec::IntoIter<(Vec<u8>, MemTableEntry)>,
}

impl Iterator for MemTableIterator {
    type Item = (Vec<u8>, MemTableEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }
}
