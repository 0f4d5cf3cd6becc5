//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::Result;

use super::reader::{Frame, WalReader};
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read valid entries in order
    /// 2. Stop at the first corrupted entry or partial write
    /// 3. Truncate the file back to the last valid entry
    /// 4. Return the valid prefix
    ///
    /// Entries after a corrupted one are dropped too, so replay always
    /// yields a prefix of the committed history.
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, valid_len) = Self::scan(path, true)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            tracing::warn!(
                "WAL {} had a damaged tail; truncated to {} bytes",
                path.display(),
                valid_len
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path, false)?;
        Ok(result)
    }

    fn scan(path: &Path, collect: bool) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        let valid_len = loop {
            match reader.read_frame()? {
                Frame::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    if collect {
                        entries.push(entry);
                    }
                }
                Frame::Corrupt { error, len } => {
                    tracing::warn!("Corrupted WAL entry ({} bytes): {}", len, error);
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break reader.position() - len;
                }
                Frame::Truncated => {
                    result.was_truncated = true;
                    break reader.position();
                }
                Frame::Eof => break reader.position(),
            }
        };

        Ok((entries, result, valid_len))
    }
}
