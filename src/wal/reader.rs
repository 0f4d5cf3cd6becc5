//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{DbError, Result};

use super::entry::{EntryHeader, MAX_PAYLOAD_SIZE};
use super::{WalEntry, HEADER_SIZE};

/// Outcome of reading one framed entry
#[derive(Debug)]
pub(crate) enum Frame {
    /// A well-formed entry
    Entry(WalEntry),
    /// A complete frame whose checksum or payload is bad; `len` bytes skipped
    Corrupt { error: DbError, len: u64 },
    /// The file ends in the middle of a frame (partial write)
    Truncated,
    /// Clean end of file
    Eof,
}

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Byte offset of the next unread frame
    position: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// A partial frame at the tail is treated as the end of the log;
    /// a corrupted frame is reported as `WalCorruption`.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        match self.read_frame()? {
            Frame::Entry(entry) => Ok(Some(entry)),
            Frame::Corrupt { error, .. } => Err(error),
            Frame::Truncated | Frame::Eof => Ok(None),
        }
    }

    /// Iterate over all valid entries
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    /// Byte offset just past the last frame read
    pub fn position(&self) -> u64 {
        self.position
    }

    pub(crate) fn read_frame(&mut self) -> Result<Frame> {
        let mut raw = [0u8; HEADER_SIZE];
        let n = read_fully(&mut self.reader, &mut raw)?;
        if n == 0 {
            return Ok(Frame::Eof);
        }
        if n < HEADER_SIZE {
            return Ok(Frame::Truncated);
        }

        let header = EntryHeader::parse(&raw);
        if header.len > MAX_PAYLOAD_SIZE {
            // A garbage length cannot be skipped reliably
            return Ok(Frame::Truncated);
        }

        let mut payload = vec![0u8; header.len as usize];
        let n = read_fully(&mut self.reader, &mut payload)?;
        if n < payload.len() {
            return Ok(Frame::Truncated);
        }

        let len = WalEntry::framed_len(&header);
        self.position += len;

        match WalEntry::from_parts(header, &payload) {
            Ok(entry) => Ok(Frame::Entry(entry)),
            Err(error) => Ok(Frame::Corrupt { error, len }),
        }
    }
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_fully<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(DbError::Io(e)),
        }
    }
    Ok(filled)
}
