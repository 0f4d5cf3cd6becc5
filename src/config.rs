//! Store configuration
//!
//! ```text
//!   {data_dir}/
//!     ├── wal.log          write-ahead log
//!     └── sstables/        flushed sorted tables
//! ```

use std::path::PathBuf;

use crate::error::{DbError, Result};

const WAL_FILENAME: &str = "wal.log";
const SSTABLE_DIR: &str = "sstables";

/// Settings for one store location
#[derive(Debug, Clone)]
pub struct Config {
    /// Root of the store; holds the WAL and the SSTable directory
    pub data_dir: PathBuf,

    /// Create `data_dir` when it does not exist yet
    pub create_if_missing: bool,

    /// How often the WAL is fsynced
    pub wal_sync_strategy: WalSyncStrategy,

    /// Buffered bytes before the memtable is flushed to an SSTable
    pub memtable_size_limit: usize,
}

/// When appended WAL entries reach the disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every entry
    EveryWrite,

    /// fsync once `count` entries are pending
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./atlasdb_data"),
            create_if_missing: true,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join(WAL_FILENAME)
    }

    pub fn sstable_dir(&self) -> PathBuf {
        self.data_dir.join(SSTABLE_DIR)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(DbError::Config("data_dir must not be empty".to_string()));
        }
        if self.memtable_size_limit == 0 {
            return Err(DbError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(DbError::Config(
                "EveryNEntries needs a count of at least 1".to_string(),
            ));
        }
        if !self.create_if_missing && !self.data_dir.is_dir() {
            return Err(DbError::Config(format!(
                "{} does not exist and create_if_missing is off",
                self.data_dir.display()
            )));
        }
        Ok(())
    }
}

/// Chained construction of a [`Config`]
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.config.create_if_missing = create;
        self
    }

    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Flush threshold in bytes
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
