//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{DbError, Result};

use super::iterator::SSTableIterator;
use super::{le_u32, le_u64, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// CRC32 of the bytes between the header and `index_offset`
fn data_block_crc(file: &mut File, index_offset: u64) -> Result<u32> {
    file.seek(SeekFrom::Start(HEADER_SIZE))?;
    let mut data = file.take(index_offset - HEADER_SIZE);
    let mut hasher = crc32fast::Hasher::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = data.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Reader for SSTable files with in-memory index for O(log n) lookups
///
/// Point lookups share one buffered handle behind a mutex, so `get` takes
/// `&self`; scans open their own handle and never hold the mutex.
pub struct SSTableReader {
    path: PathBuf,
    /// Shared handle for point lookups
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of the data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Loads the entire index into memory for fast lookups.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(DbError::Storage(format!(
                "SSTable {} too small: {} bytes",
                path.display(),
                file_size
            )));
        }

        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(DbError::Storage(format!(
                "Invalid SSTable magic: expected ATDB, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(DbError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = le_u64(&header, 6);

        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = le_u64(&footer, 0);
        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(DbError::Storage(format!(
                "SSTable {} has out-of-range index offset {}",
                path.display(),
                index_offset
            )));
        }

        let stored_crc = le_u32(&footer, 8);
        let actual_crc = data_block_crc(&mut file, index_offset)?;
        if actual_crc != stored_crc {
            return Err(DbError::Storage(format!(
                "SSTable {} data block checksum mismatch: stored {:#010x}, computed {:#010x}",
                path.display(),
                stored_crc,
                actual_crc
            )));
        }

        file.seek(SeekFrom::Start(index_offset))?;
        let mut index_data = vec![0u8; (file_size - FOOTER_SIZE - index_offset) as usize];
        file.read_exact(&mut index_data)?;
        let index = parse_index(&index_data)?;

        if index.len() as u64 != entry_count {
            return Err(DbError::Storage(format!(
                "SSTable {} index holds {} keys, header says {}",
                path.display(),
                index.len(),
                entry_count
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Get a value by key via the in-memory index
    ///
    /// Returns:
    /// - `Ok(Some(value))`: key found with value
    /// - `Ok(None)`: key found but is a tombstone (deleted)
    /// - `Err(KeyNotFound)`: key not in this SSTable
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Err(DbError::KeyNotFound),
        };

        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header)?;

        let key_len = le_u32(&header, 0) as i64;
        let val_len = le_u32(&header, 4);

        // Skip the key (we already know it matches)
        file.seek(SeekFrom::Current(key_len))?;

        if val_len == TOMBSTONE_MARKER {
            return Ok(None);
        }

        let mut value = vec![0u8; val_len as usize];
        file.read_exact(&mut value)?;

        Ok(Some(value))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Iterate over all entries in key order
    pub fn iter(&self) -> Result<SSTableIterator> {
        SSTableIterator::open(&self.path, HEADER_SIZE, self.index_offset)
    }

    /// Iterate over entries whose key is `>= start`, in key order
    pub fn scan_from(&self, start: &[u8]) -> Result<SSTableIterator> {
        let offset = self
            .index
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .next()
            .map(|(_, &off)| off)
            .unwrap_or(self.index_offset);
        SSTableIterator::open(&self.path, offset, self.index_offset)
    }
}

/// Parse index entries: [key_len(4)][offset(8)][key]
fn parse_index(data: &[u8]) -> Result<BTreeMap<Vec<u8>, u64>> {
    let mut index = BTreeMap::new();
    let mut pos = 0;

    while pos < data.len() {
        if pos + 12 > data.len() {
            return Err(DbError::Storage("Truncated SSTable index entry".to_string()));
        }
        let key_len = le_u32(data, pos) as usize;
        let offset = le_u64(data, pos + 4);
        pos += 12;

        if pos + key_len > data.len() {
            return Err(DbError::Storage("Truncated SSTable index key".to_string()));
        }
        index.insert(data[pos..pos + key_len].to_vec(), offset);
        pos += key_len;
    }

    Ok(index)
}
