//! Cursor Module
//!
//! Forward-only, single-use walkers over a collection's primary namespace
//! or one of its index namespaces.
//!
//! ## State Machine
//! ```text
//!                 advance()                 advance(), no more entries
//!   NotStarted ─────────────► Positioned ─────────────────────────► Exhausted
//!        │                     │     ▲ │
//!        │                     │     └─┘ advance()
//!        │   storage failure   ▼
//!        └─────────────────► Errored
//! ```
//!
//! Decoding happens in [`Cursor::value`], one entry at a time. A record that
//! fails to decode is reported by that call alone; the cursor stays
//! positioned and the next `advance()` moves past it.
//!
//! A cursor reads from the snapshot taken when it was opened and never
//! observes later writes.

use std::sync::Arc;

use crate::codec::Codec;
use crate::database::Database;
use crate::error::{DbError, Result};
use crate::keycode::{self, PrimaryKey};
use crate::keyspace::{self, CollectionKeys};
use crate::snapshot::{ScanIterator, Snapshot};

/// Coarse position of a cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorStatus {
    NotStarted,
    Positioned,
    Exhausted,
    Errored,
}

enum State {
    NotStarted,
    Positioned {
        id: PrimaryKey,
        /// Payload for primary scans; index scans look it up on demand
        payload: Option<Vec<u8>>,
    },
    Exhausted,
    /// `None` once the error has been handed out by the `Iterator` impl
    Errored(Option<DbError>),
}

enum Source {
    Primary,
    Index {
        snapshot: Snapshot,
        keys: Arc<CollectionKeys>,
        /// Exact length of a matching index key; longer keys belong to
        /// string values that merely start with the searched one
        entry_len: usize,
    },
}

/// Stateful walker yielding `(id, record)` pairs in key order
pub struct Cursor<T> {
    db: Database,
    codec: Codec<T>,
    collection: String,
    scan: ScanIterator,
    source: Source,
    state: State,
}

impl<T> Cursor<T> {
    pub(crate) fn primary(db: Database, codec: Codec<T>, collection: String, scan: ScanIterator) -> Self {
        Self {
            db,
            codec,
            collection,
            scan,
            source: Source::Primary,
            state: State::NotStarted,
        }
    }

    pub(crate) fn index(
        db: Database,
        codec: Codec<T>,
        collection: String,
        scan: ScanIterator,
        snapshot: Snapshot,
        keys: Arc<CollectionKeys>,
        entry_len: usize,
    ) -> Self {
        Self {
            db,
            codec,
            collection,
            scan,
            source: Source::Index {
                snapshot,
                keys,
                entry_len,
            },
            state: State::NotStarted,
        }
    }

    /// Move to the next entry; returns false once exhausted or errored
    pub fn advance(&mut self) -> bool {
        match self.state {
            State::Exhausted | State::Errored(_) => return false,
            State::NotStarted | State::Positioned { .. } => {}
        }

        if self.db.is_closed() {
            self.state = State::Errored(Some(DbError::Closed));
            return false;
        }

        match self.next_entry() {
            Ok(Some((id, payload))) => {
                self.state = State::Positioned { id, payload };
                true
            }
            Ok(None) => {
                self.state = State::Exhausted;
                false
            }
            Err(e) => {
                tracing::warn!("Cursor over '{}' failed: {}", self.collection, e);
                self.state = State::Errored(Some(e));
                false
            }
        }
    }

    fn next_entry(&mut self) -> Result<Option<(PrimaryKey, Option<Vec<u8>>)>> {
        for entry in self.scan.by_ref() {
            let (key, value) = entry?;
            match &self.source {
                Source::Primary => {
                    let id = keyspace::trailing_id(&key)?;
                    return Ok(Some((id, Some(value))));
                }
                Source::Index { entry_len, .. } => {
                    if key.len() != *entry_len {
                        continue;
                    }
                    let id = keycode::decode_primary_key(&value)?;
                    return Ok(Some((id, None)));
                }
            }
        }
        Ok(None)
    }

    /// Id of the current entry (for index scans, the id the entry points at)
    pub fn key(&self) -> Option<PrimaryKey> {
        match self.state {
            State::Positioned { id, .. } => Some(id),
            _ => None,
        }
    }

    /// Decode the current record
    ///
    /// Errors are per entry and leave the cursor where it is.
    pub fn value(&self) -> Result<T> {
        let (id, payload) = match &self.state {
            State::Positioned { id, payload } => (*id, payload),
            _ => return Err(DbError::CursorNotPositioned),
        };
        self.db.ensure_open()?;

        match (&self.source, payload) {
            (Source::Primary, Some(bytes)) => self.codec.decode(bytes),
            (Source::Index { snapshot, keys, .. }, _) => {
                let bytes = snapshot.get(&keys.primary_key(id))?.ok_or_else(|| DbError::NotFound {
                    collection: self.collection.clone(),
                    id,
                })?;
                self.codec.decode(&bytes)
            }
            (Source::Primary, None) => Err(DbError::CursorNotPositioned),
        }
    }

    pub fn status(&self) -> CursorStatus {
        match self.state {
            State::NotStarted => CursorStatus::NotStarted,
            State::Positioned { .. } => CursorStatus::Positioned,
            State::Exhausted => CursorStatus::Exhausted,
            State::Errored(_) => CursorStatus::Errored,
        }
    }

    /// The failure that ended the walk, if any
    pub fn error(&self) -> Option<&DbError> {
        match &self.state {
            State::Errored(e) => e.as_ref(),
            _ => None,
        }
    }

    /// Name of the collection being walked
    pub fn collection(&self) -> &str {
        &self.collection
    }
}

impl<T> Iterator for Cursor<T> {
    /// `(id, record-or-error)`; a failure of the walk itself is yielded
    /// once as `(0, Err(..))`
    type Item = (PrimaryKey, Result<T>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.advance() {
            let id = self.key()?;
            return Some((id, self.value()));
        }

        match &mut self.state {
            State::Errored(error) => error.take().map(|e| (0, Err(e))),
            _ => None,
        }
    }
}
