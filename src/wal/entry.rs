//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{DbError, Result};

/// Entry header: LSN (8) + CRC (4) + Len (4) = 16 bytes
pub const HEADER_SIZE: usize = 16;

/// Upper bound on a single entry payload (64 MB); anything larger is corruption
pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The operation to perform
    pub operation: Operation,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair
    Put { key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    Delete { key: Vec<u8> },

    /// Several mutations applied all-or-nothing
    Batch { ops: Vec<Operation> },
}

impl Operation {
    /// Number of single-key mutations carried by this operation
    pub fn mutation_count(&self) -> usize {
        match self {
            Operation::Put { .. } | Operation::Delete { .. } => 1,
            Operation::Batch { ops } => ops.iter().map(Operation::mutation_count).sum(),
        }
    }
}

/// Decoded entry header
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl EntryHeader {
    pub(crate) fn parse(bytes: &[u8; HEADER_SIZE]) -> Self {
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);
        Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len),
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current wall-clock time
    pub fn new(lsn: u64, operation: Operation) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        Self {
            lsn,
            operation,
            timestamp,
        }
    }

    /// Serialize to the on-disk layout:
    /// `[LSN u64 LE][CRC32 u32 LE][Len u32 LE][payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(&(&self.operation, self.timestamp))
            .map_err(|e| DbError::WalWrite(format!("Failed to encode WAL entry: {}", e)))?;

        if payload.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(DbError::WalWrite(format!(
                "WAL entry too large: {} bytes (max {})",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }

        let crc = crc32fast::hash(&payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);

        Ok(bytes)
    }

    /// Deserialize one entry from the start of `bytes`
    ///
    /// Fails with `WalCorruption` on truncation or CRC mismatch.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(DbError::WalCorruption(format!(
                "Truncated header: expected {} bytes, got {}",
                HEADER_SIZE,
                bytes.len()
            )));
        }

        let mut raw = [0u8; HEADER_SIZE];
        raw.copy_from_slice(&bytes[..HEADER_SIZE]);
        let header = EntryHeader::parse(&raw);

        let end = HEADER_SIZE + header.len as usize;
        if header.len > MAX_PAYLOAD_SIZE || bytes.len() < end {
            return Err(DbError::WalCorruption(format!(
                "Truncated payload: expected {} bytes, got {}",
                header.len,
                bytes.len() - HEADER_SIZE
            )));
        }

        Self::from_parts(header, &bytes[HEADER_SIZE..end])
    }

    /// Rebuild an entry from an already-split header and payload
    pub(crate) fn from_parts(header: EntryHeader, payload: &[u8]) -> Result<Self> {
        let actual = crc32fast::hash(payload);
        if actual != header.crc {
            return Err(DbError::WalCorruption(format!(
                "CRC mismatch at LSN {}: expected {:08x}, got {:08x}",
                header.lsn, header.crc, actual
            )));
        }

        let (operation, timestamp): (Operation, u64) = bincode::deserialize(payload)
            .map_err(|e| DbError::WalCorruption(format!("Malformed payload: {}", e)))?;

        Ok(Self {
            lsn: header.lsn,
            operation,
            timestamp,
        })
    }

    /// Total serialized length given a payload length
    pub(crate) fn framed_len(header: &EntryHeader) -> u64 {
        HEADER_SIZE as u64 + header.len as u64
    }
}
