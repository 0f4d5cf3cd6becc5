//! Engine Module
//!
//! The ordered key-value engine underneath the object store.
//!
//! ## Responsibilities
//! - Coordinate WAL, MemTable, and Storage
//! - Apply multi-key write batches atomically
//! - Hand out snapshots for consistent reads and scans
//! - Trigger flushes when MemTable is full
//! - Manage crash recovery on startup

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::config::Config;
use crate::error::Result;
use crate::memtable::{MemTable, MemTableEntry};
use crate::snapshot::{ScanIterator, Snapshot};
use crate::storage::StorageManager;
use crate::wal::{Operation, WalRecovery, WalWriter};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/batch/transaction/flush): Serialized by `write_lock`
///   - Only ONE write operation at a time
///   - Must acquire: write_lock → WAL → memtable → storage (write)
///   - A batch is one WAL entry and one memtable lock acquisition
///
/// - **Reads** (get/snapshot/scan): never take `write_lock`
///   - Snapshots pin the memtable version first, then the SSTable list,
///     so a concurrent flush can only make data visible twice, never lose it
pub struct Engine {
    config: Config,

    /// Directory for all data files (SSTables)
    storage_dir: PathBuf,

    /// Write-ahead log for durability (exclusive access needed)
    wal: Mutex<WalWriter>,

    /// In-memory table for recent writes (internal RwLock)
    memtable: MemTable,

    /// Persistent storage manager (internal RwLock on sstables vec)
    storage: StorageManager,

    /// Serializes write operations
    write_lock: Mutex<()>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Validate the config and create the data directory
    /// 2. Load existing SSTables
    /// 3. Recover from WAL if exists, flush recovered data
    /// 4. Start a fresh WAL
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let storage_dir = config.sstable_dir();
        let wal_path = config.wal_path();

        let storage = StorageManager::open(&storage_dir)?;
        let memtable = MemTable::new();

        if wal_path.exists() {
            let (entries, recovery) = WalRecovery::recover(&wal_path)?;

            if recovery.entries_recovered > 0 || recovery.entries_corrupted > 0 {
                tracing::info!(
                    "WAL recovery: {} entries recovered, {} corrupted, last_lsn={}",
                    recovery.entries_recovered,
                    recovery.entries_corrupted,
                    recovery.last_lsn
                );
            }

            for entry in entries {
                memtable.apply(entry.operation);
            }

            // Recovered data must be durable before the WAL is reset
            if !memtable.is_empty() {
                tracing::info!(
                    "Flushing {} recovered entries to SSTable",
                    memtable.entry_count()
                );
                storage.flush(&memtable)?;
                memtable.clear();
            }
        }

        let wal = WalWriter::open(&wal_path, config.wal_sync_strategy)?;

        tracing::debug!(
            "Engine opened at {} ({} SSTables)",
            config.data_dir.display(),
            storage.sstable_count()
        );

        Ok(Self {
            config,
            storage_dir,
            wal: Mutex::new(wal),
            memtable,
            storage,
            write_lock: Mutex::new(()),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a value by key
    ///
    /// Search order:
    /// 1. MemTable (most recent writes)
    /// 2. SSTables (newest to oldest)
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        if let Some(entry) = self.memtable.get(key) {
            return match entry {
                MemTableEntry::Value(value) => Ok(Some(value)),
                MemTableEntry::Tombstone => Ok(None),
            };
        }

        self.storage.get(key)
    }

    /// Take a point-in-time view of the keyspace
    pub fn snapshot(&self) -> Snapshot {
        // Order matters: memtable version before SSTable list
        let memtable = self.memtable.snapshot();
        let sstables = self.storage.readers();
        Snapshot::new(memtable, sstables)
    }

    /// Scan all live keys starting with `prefix` as of now
    pub fn scan_prefix(&self, prefix: &[u8]) -> Result<ScanIterator> {
        self.snapshot().scan_prefix(prefix)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.put(key.to_vec(), value.to_vec());
        self.write(batch)
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key.to_vec());
        self.write(batch)
    }

    /// Apply a batch of mutations atomically
    pub fn write(&self, batch: WriteBatch) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.commit_locked(batch)
    }

    /// Run `f` as a read-modify-write transaction
    ///
    /// `f` sees the latest committed state plus its own staged writes. No
    /// other writer runs until it returns. Its writes commit as one batch
    /// if it returns `Ok`; on `Err` nothing is written.
    pub fn transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<R>,
    {
        let _write_guard = self.write_lock.lock();

        let mut txn = Transaction {
            engine: self,
            batch: WriteBatch::new(),
            staged: BTreeMap::new(),
        };
        let result = f(&mut txn)?;
        self.commit_locked(txn.batch)?;

        Ok(result)
    }

    /// Commit a batch (caller holds the write lock)
    ///
    /// Steps:
    /// 1. Write to WAL (durability)
    /// 2. Apply to MemTable (visibility)
    /// 3. Flush if the MemTable is over its limit
    ///
    /// The batch is committed once step 2 is done. A failed flush is
    /// logged and retried by the next commit, `flush` or `close`.
    fn commit_locked(&self, batch: WriteBatch) -> Result<()> {
        let operation = match batch.into_operation() {
            Some(op) => op,
            None => return Ok(()),
        };

        self.wal.lock().append(operation.clone())?;

        self.memtable.apply(operation);

        if self.memtable.should_flush(self.config.memtable_size_limit) {
            if let Err(e) = self.flush_internal() {
                tracing::warn!("Flush after commit failed, will retry: {}", e);
            }
        }

        Ok(())
    }

    /// Flush memtable to disk (public API)
    ///
    /// Forces a flush regardless of memtable size
    pub fn flush(&self) -> Result<()> {
        let _write_guard = self.write_lock.lock();
        self.flush_internal()
    }

    /// Internal flush implementation (called with write lock held)
    fn flush_internal(&self) -> Result<()> {
        if self.memtable.is_empty() {
            return Ok(());
        }

        // New table becomes visible before the memtable is emptied
        self.storage.flush(&self.memtable)?;
        self.memtable.clear();

        // Entries are now durable in the SSTable
        self.wal.lock().truncate()?;

        Ok(())
    }

    /// Close the engine gracefully
    ///
    /// Flushes any pending data and syncs to disk
    pub fn close(self) -> Result<()> {
        let _write_guard = self.write_lock.lock();

        self.flush_internal()?;
        self.wal.lock().sync()?;

        tracing::debug!("Engine at {} closed", self.config.data_dir.display());
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the storage directory path (where SSTables are stored)
    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    /// Get the current memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the memtable entry count
    pub fn memtable_entry_count(&self) -> usize {
        self.memtable.entry_count()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.storage.sstable_count()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

// =============================================================================
// Write Batches
// =============================================================================

/// An ordered list of mutations committed all-or-nothing
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    ops: Vec<Operation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.ops.push(Operation::Put { key, value });
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.ops.push(Operation::Delete { key });
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Single mutations are logged as themselves, larger batches as one
    /// `Operation::Batch`
    fn into_operation(mut self) -> Option<Operation> {
        match self.ops.len() {
            0 => None,
            1 => self.ops.pop(),
            _ => Some(Operation::Batch { ops: self.ops }),
        }
    }
}

/// Staged writes of an in-flight [`Engine::transaction`]
pub struct Transaction<'a> {
    engine: &'a Engine,
    batch: WriteBatch,
    /// Latest staged state per key; `None` means deleted
    staged: BTreeMap<Vec<u8>, Option<Vec<u8>>>,
}

impl Transaction<'_> {
    /// Read a key, seeing this transaction's own writes first
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        match self.staged.get(key) {
            Some(staged) => Ok(staged.clone()),
            None => self.engine.get(key),
        }
    }

    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.staged.insert(key.clone(), Some(value.clone()));
        self.batch.put(key, value);
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.staged.insert(key.clone(), None);
        self.batch.delete(key);
    }

    /// Number of staged mutations
    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }
}
