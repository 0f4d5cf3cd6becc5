//! Snapshot Module
//!
//! Point-in-time read views over the engine.
//!
//! A snapshot pins one memtable version and the SSTable set that existed
//! when it was taken. Later writes and flushes install new versions and
//! leave the pinned ones untouched.
//!
//! ## Scan Merge
//! ```text
//!   memtable ─┐
//!   sst #3  ──┼──► smallest key wins, newest source shadows older ones,
//!   sst #2  ──┤    tombstones are dropped
//!   sst #1  ──┘
//! ```

use std::sync::Arc;

use crate::error::Result;
use crate::memtable::{MemTableEntry, MemTableSnapshot};
use crate::storage::{lookup, SSTableIterator, SSTableReader};

/// Consistent read view of the whole keyspace
#[derive(Clone)]
pub struct Snapshot {
    memtable: MemTableSnapshot,
    /// Newest first
    sstables: Vec<Arc<SSTableReader>>,
}

impl Snapshot {
    pub(crate) fn new(memtable: MemTableSnapshot, sstables: Vec<Arc<SSTableReader>>) -> Self {
        Self { memtable, sstables }
    }

    /// Get a value by key as of this snapshot
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.memtable.get(key) {
            Some(MemTableEntry::Value(value)) => Ok(Some(value.clone())),
            Some(MemTableEntry::Tombstone) => Ok(None),
            None => lookup(&self.sstables, key),
        }
    }

    /// Iterate over live entries whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<ScanIterator> {
        let mem_head = self
            .memtable
            .seek(prefix, false)
            .map(|(k, v)| (k.to_vec(), v.clone()));

        let mut tables = Vec::with_capacity(self.sstables.len());
        for reader in &self.sstables {
            let mut iter = reader.scan_from(prefix)?;
            let head = iter.next().transpose()?;
            tables.push(TableSource { iter, head });
        }

        Ok(ScanIterator {
            prefix: prefix.to_vec(),
            memtable: self.memtable.clone(),
            mem_head,
            tables,
            done: false,
        })
    }
}

struct TableSource {
    iter: SSTableIterator,
    /// Next unconsumed entry; `None` value is a tombstone
    head: Option<(Vec<u8>, Option<Vec<u8>>)>,
}

/// Merging iterator over one key prefix of a snapshot
///
/// Yields `(key, value)` pairs lazily; an SSTable read failure is
/// yielded once and ends the iteration.
pub struct ScanIterator {
    prefix: Vec<u8>,
    memtable: MemTableSnapshot,
    mem_head: Option<(Vec<u8>, MemTableEntry)>,
    tables: Vec<TableSource>,
    done: bool,
}

impl ScanIterator {
    fn smallest_key(&self) -> Option<Vec<u8>> {
        let mem = self.mem_head.as_ref().map(|(k, _)| k);
        let tables = self
            .tables
            .iter()
            .filter_map(|t| t.head.as_ref().map(|(k, _)| k));
        mem.into_iter().chain(tables).min().cloned()
    }

    /// Consume `key` from every source positioned on it, returning the value
    /// of the newest one
    fn take(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut winner: Option<Option<Vec<u8>>> = None;

        if self.mem_head.as_ref().map_or(false, |(k, _)| k.as_slice() == key) {
            if let Some((_, entry)) = self.mem_head.take() {
                winner = Some(match entry {
                    MemTableEntry::Value(v) => Some(v),
                    MemTableEntry::Tombstone => None,
                });
            }
            self.mem_head = self
                .memtable
                .seek(key, true)
                .map(|(k, v)| (k.to_vec(), v.clone()));
        }

        for table in &mut self.tables {
            if table.head.as_ref().map_or(false, |(k, _)| k.as_slice() == key) {
                if let Some((_, value)) = table.head.take() {
                    winner.get_or_insert(value);
                }
                table.head = table.iter.next().transpose()?;
            }
        }

        Ok(winner.flatten())
    }
}

impl Iterator for ScanIterator {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let key = match self.smallest_key() {
                Some(key) if key.starts_with(&self.prefix) => key,
                _ => {
                    self.done = true;
                    return None;
                }
            };

            match self.take(&key) {
                Ok(Some(value)) => return Some(Ok((key, value))),
                Ok(None) => continue, // deleted
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}
