//! WAL Writer
//!
//! Handles appending entries to the WAL file.
//!
//! Each frame goes to the file in one `write_all`, so the writer always
//! knows where the last complete frame ends. A failed write is cut back
//! to that offset. If the log cannot be restored, or an fsync fails, the
//! writer refuses every later call: appending past a torn frame would
//! make recovery drop the later entries.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::{DbError, Result};

use super::{Operation, WalEntry};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    /// `None` once the log is in an unknown state
    file: Option<File>,
    /// Length of the log up to the end of the last complete frame
    end_offset: u64,
    /// LSN that the next appended entry receives
    current_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    uncommitted: usize,
}

impl WalWriter {
    /// Create (or reset) a WAL file
    ///
    /// Any existing content is discarded: callers replay the old log
    /// before opening a writer over it.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.sync_all()?;

        Self::from_file(path, file, sync_strategy)
    }

    /// Append to an already open, empty log
    ///
    /// LSNs start at 1. `path` is only used in messages.
    pub fn from_file(path: &Path, mut file: File, sync_strategy: WalSyncStrategy) -> Result<Self> {
        let end_offset = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Some(file),
            end_offset,
            current_lsn: 1,
            sync_strategy,
            uncommitted: 0,
        })
    }

    /// Append an operation to the WAL, returning its LSN
    ///
    /// On error the entry is not in the log.
    pub fn append(&mut self, operation: Operation) -> Result<u64> {
        let lsn = self.current_lsn;
        let bytes = WalEntry::new(lsn, operation).serialize()?;
        let start = self.end_offset;

        if let Err(e) = self.active()?.write_all(&bytes) {
            self.rollback(start);
            return Err(DbError::WalWrite(format!("Append at LSN {} failed: {}", lsn, e)));
        }

        let uncommitted = self.uncommitted + 1;
        let should_sync = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => uncommitted >= count.max(1),
        };
        if should_sync {
            if let Err(e) = self.active()?.sync_data() {
                tracing::error!("WAL {} fsync failed: {}", self.path.display(), e);
                // Keep the unacknowledged frame out of recovery if possible
                self.rollback(start);
                self.file = None;
                return Err(DbError::WalWrite(format!("Sync at LSN {} failed: {}", lsn, e)));
            }
        }

        self.end_offset = start + bytes.len() as u64;
        self.current_lsn += 1;
        self.uncommitted = if should_sync { 0 } else { uncommitted };

        Ok(lsn)
    }

    /// Force sync to disk
    ///
    /// A failed fsync leaves the writer unusable.
    pub fn sync(&mut self) -> Result<()> {
        if let Err(e) = self.active()?.sync_data() {
            tracing::error!("WAL {} fsync failed: {}", self.path.display(), e);
            self.file = None;
            return Err(DbError::WalWrite(format!("Sync failed: {}", e)));
        }
        self.uncommitted = 0;
        Ok(())
    }

    /// Discard every entry and restart LSNs at 1
    ///
    /// Called once the logged data is durable elsewhere (after a flush).
    pub fn truncate(&mut self) -> Result<()> {
        let file = self.active()?;
        let reset = file
            .set_len(0)
            .and_then(|_| file.seek(SeekFrom::Start(0)))
            .and_then(|_| file.sync_all());

        if let Err(e) = reset {
            self.file = None;
            return Err(DbError::WalWrite(format!("Truncate failed: {}", e)));
        }

        self.end_offset = 0;
        self.current_lsn = 1;
        self.uncommitted = 0;
        Ok(())
    }

    /// Get the current LSN (the one the next append will use)
    pub fn current_lsn(&self) -> u64 {
        self.current_lsn
    }

    /// Entries appended since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Byte length of the complete frames written so far
    pub fn end_offset(&self) -> u64 {
        self.end_offset
    }

    /// True once a failure left the log in a state this writer cannot repair
    pub fn is_failed(&self) -> bool {
        self.file.is_none()
    }

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn active(&mut self) -> Result<&mut File> {
        match self.file.as_mut() {
            Some(file) => Ok(file),
            None => Err(DbError::WalWrite(format!(
                "WAL {} is unusable after an earlier failure",
                self.path.display()
            ))),
        }
    }

    /// Cut the log back to `offset`; gives up on the file if that fails
    fn rollback(&mut self, offset: u64) {
        let Some(file) = self.file.as_mut() else {
            return;
        };

        let restored = file
            .set_len(offset)
            .and_then(|_| file.seek(SeekFrom::Start(offset)));

        match restored {
            Ok(_) => self.end_offset = offset,
            Err(e) => {
                tracing::error!(
                    "WAL {} could not be cut back to {} bytes: {}",
                    self.path.display(),
                    offset,
                    e
                );
                self.file = None;
            }
        }
    }
}
