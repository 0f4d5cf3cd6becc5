//! Collections
//!
//! A [`Collection`] is the typed handle for one record type. It owns the
//! primary namespace (id → payload) and one index namespace per declared
//! index (value ++ id → id), and keeps them in step:
//!
//! - `add` writes the payload, every index entry and the new id
//!   high-water mark in one engine transaction
//! - `remove` deletes the payload and every index entry in one transaction
//! - reads and scans run against snapshots, so no reader ever sees a
//!   record without its index entries or the reverse
//!
//! The first handle opened for a name fixes its set of indexed fields.
//! Later handles must declare the same set: a handle missing an index
//! would write records that index never sees.

use std::sync::Arc;

use crate::codec::Codec;
use crate::cursor::Cursor;
use crate::database::Database;
use crate::engine::Transaction;
use crate::error::{DbError, Result};
use crate::keycode::{self, IndexValue, PrimaryKey};
use crate::keyspace::CollectionKeys;
use crate::schema::Schema;

/// Typed handle for one record type
pub struct Collection<T> {
    db: Database,
    schema: Arc<Schema<T>>,
    codec: Codec<T>,
    keys: Arc<CollectionKeys>,
}

impl<T: 'static> Collection<T> {
    pub(crate) fn new(db: Database, schema: Schema<T>, codec: Codec<T>) -> Result<Self> {
        schema.validate()?;
        let keys = CollectionKeys::new(schema.name(), schema.index_names())?;
        db.with_engine(|engine| {
            engine.transaction(|txn| register_indexes(txn, &keys, &schema))
        })?;

        tracing::debug!(
            "Collection '{}' ready ({} indexes, {} codec)",
            schema.name(),
            schema.indexes().len(),
            codec.name()
        );

        Ok(Self {
            db,
            schema: Arc::new(schema),
            codec,
            keys: Arc::new(keys),
        })
    }

    /// Insert a record, returning its newly assigned id
    ///
    /// The record is serialized before anything is written; an encoding
    /// failure leaves the store untouched.
    pub fn add(&self, record: &T) -> Result<PrimaryKey> {
        let payload = self.codec.encode(record)?;
        let index_values: Vec<IndexValue> = self
            .schema
            .indexes()
            .iter()
            .map(|index| index.extract(record))
            .collect();

        let id = self.db.with_engine(|engine| {
            engine.transaction(|txn| {
                let id = self.allocate_id(txn)?;
                txn.put(self.keys.primary_key(id), payload);
                self.stage_index_entries(txn, &index_values, id)?;
                Ok(id)
            })
        })?;

        tracing::trace!("Added record {} to '{}'", id, self.schema.name());
        Ok(id)
    }

    /// Fetch a record by id
    pub fn get(&self, id: PrimaryKey) -> Result<T> {
        let bytes = self
            .db
            .with_engine(|engine| engine.get(&self.keys.primary_key(id)))?
            .ok_or_else(|| self.not_found(id))?;
        self.codec.decode(&bytes)
    }

    /// True if a record with this id exists
    pub fn contains(&self, id: PrimaryKey) -> Result<bool> {
        let bytes = self
            .db
            .with_engine(|engine| engine.get(&self.keys.primary_key(id)))?;
        Ok(bytes.is_some())
    }

    /// Delete a record and its index entries, returning the record
    ///
    /// The stored payload is decoded to find the index entries; if that
    /// fails nothing is removed. The id is never handed out again.
    pub fn remove(&self, id: PrimaryKey) -> Result<T> {
        let record = self.db.with_engine(|engine| {
            engine.transaction(|txn| {
                let primary_key = self.keys.primary_key(id);
                let bytes = txn.get(&primary_key)?.ok_or_else(|| self.not_found(id))?;
                let record = self.codec.decode(&bytes)?;

                txn.delete(primary_key);
                for index in self.schema.indexes() {
                    let value = index.extract(&record);
                    let key = self.index_key(index.field(), &value, id)?;
                    txn.delete(key);
                }

                Ok(record)
            })
        })?;

        tracing::trace!("Removed record {} from '{}'", id, self.schema.name());
        Ok(record)
    }

    /// Number of records, counted by scanning the primary namespace
    pub fn len(&self) -> Result<usize> {
        let scan = self
            .db
            .with_engine(|engine| engine.scan_prefix(self.keys.primary_prefix()))?;

        let mut count = 0;
        for entry in scan {
            entry?;
            count += 1;
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Cursor over every record in ascending id order
    pub fn iter_all(&self) -> Result<Cursor<T>> {
        let scan = self
            .db
            .with_engine(|engine| engine.scan_prefix(self.keys.primary_prefix()))?;

        Ok(Cursor::primary(
            self.db.clone(),
            self.codec.clone(),
            self.schema.name().to_string(),
            scan,
        ))
    }

    /// Cursor over the records whose `field` equals `value`, in id order
    pub fn iter_equal(&self, field: &str, value: impl Into<IndexValue>) -> Result<Cursor<T>> {
        let value = value.into();
        let prefix = self
            .keys
            .index_value_prefix(field, &value)
            .ok_or_else(|| self.unknown_index(field))?;

        let (snapshot, scan) = self.db.with_engine(|engine| {
            let snapshot = engine.snapshot();
            let scan = snapshot.scan_prefix(&prefix)?;
            Ok((snapshot, scan))
        })?;

        tracing::trace!(
            "Index scan on '{}.{}' for {}",
            self.schema.name(),
            field,
            value
        );

        Ok(Cursor::index(
            self.db.clone(),
            self.codec.clone(),
            self.schema.name().to_string(),
            scan,
            snapshot,
            Arc::clone(&self.keys),
            prefix.len() + keycode::PRIMARY_KEY_LEN,
        ))
    }

    pub fn schema(&self) -> &Schema<T> {
        &self.schema
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Next id after the persisted high-water mark; the new mark is staged
    /// in the same transaction
    fn allocate_id(&self, txn: &mut Transaction<'_>) -> Result<PrimaryKey> {
        let sequence_key = self.keys.sequence_key();
        let last = match txn.get(sequence_key)? {
            Some(bytes) => keycode::decode_primary_key(&bytes)?,
            None => 0,
        };

        let id = last.checked_add(1).ok_or_else(|| {
            DbError::Storage(format!("id space of '{}' exhausted", self.schema.name()))
        })?;

        txn.put(sequence_key.to_vec(), keycode::encode_primary_key(id).to_vec());
        Ok(id)
    }

    /// Stage one index entry per declared index
    fn stage_index_entries(
        &self,
        txn: &mut Transaction<'_>,
        values: &[IndexValue],
        id: PrimaryKey,
    ) -> Result<()> {
        for (index, value) in self.schema.indexes().iter().zip(values) {
            let key = self.index_key(index.field(), value, id)?;
            txn.put(key, keycode::encode_primary_key(id).to_vec());
        }
        Ok(())
    }

    fn index_key(&self, field: &str, value: &IndexValue, id: PrimaryKey) -> Result<Vec<u8>> {
        self.keys
            .index_key(field, value, id)
            .ok_or_else(|| self.unknown_index(field))
    }

    fn not_found(&self, id: PrimaryKey) -> DbError {
        DbError::NotFound {
            collection: self.schema.name().to_string(),
            id,
        }
    }

    fn unknown_index(&self, field: &str) -> DbError {
        DbError::UnknownIndex {
            collection: self.schema.name().to_string(),
            field: field.to_string(),
        }
    }
}

/// Persist the index set on first use, or check it against the stored one
fn register_indexes<T>(
    txn: &mut Transaction<'_>,
    keys: &CollectionKeys,
    schema: &Schema<T>,
) -> Result<()> {
    let mut declared: Vec<String> = schema.index_names().map(str::to_string).collect();
    declared.sort();

    match txn.get(keys.schema_key())? {
        Some(bytes) => {
            let stored: Vec<String> = bincode::deserialize(&bytes).map_err(|e| {
                DbError::Decoding(format!("schema of '{}': {}", schema.name(), e))
            })?;
            if stored != declared {
                return Err(DbError::Config(format!(
                    "collection '{}' was created with indexes {:?}, handle declares {:?}",
                    schema.name(),
                    stored,
                    declared
                )));
            }
        }
        None => {
            let bytes = bincode::serialize(&declared).map_err(|e| {
                DbError::Encoding(format!("schema of '{}': {}", schema.name(), e))
            })?;
            txn.put(keys.schema_key().to_vec(), bytes);
            tracing::debug!(
                "Registered collection '{}' with indexes {:?}",
                schema.name(),
                declared
            );
        }
    }
    Ok(())
}

impl<T> Clone for Collection<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            schema: Arc::clone(&self.schema),
            codec: self.codec.clone(),
            keys: Arc::clone(&self.keys),
        }
    }
}
