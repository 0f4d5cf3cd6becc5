//! On-disk storage
//!
//! Flushed memtables become immutable sorted tables under
//! `{data_dir}/sstables/`, numbered in flush order. The
//! [`StorageManager`] owns the open readers and answers point lookups
//! newest table first; scans go through [`SSTableIterator`]s that the
//! snapshot layer merges with the memtable. Byte layout lives in the
//! `sstable` module.
//!
//! ```text
//!   sstables/
//!     ├── sstable_000001.sst
//!     ├── sstable_000002.sst     newer tables shadow older ones
//!     └── sstable_000003.tmp     removed on open (interrupted flush)
//! ```

mod sstable;
mod manager;

pub use sstable::{SSTable, SSTableBuilder, SSTableIterator, SSTableReader};
pub use manager::StorageManager;

pub(crate) use manager::lookup;
