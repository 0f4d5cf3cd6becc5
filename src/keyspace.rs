//! Keyspace layout
//!
//! Every collection owns disjoint key ranges in the engine:
//!
//! ```text
//! primary   0x01 | u16 len | name |                            id (8) → payload
//! index     0x02 | u16 len | name | u16 len | field | value |  id (8) → id (8)
//! sequence  0x03 | u16 len | name                                     → last id (8)
//! schema    0x04 | u16 len | name                                     → index fields
//! ```
//!
//! The schema entry records the sorted index field names the collection
//! was created with; handles declaring a different set are refused.
//!
//! Names are length-prefixed so no collection's range is a prefix of
//! another's. Index values use the order-preserving encoding in
//! [`crate::keycode`]; the trailing id keeps duplicate values distinct.

use crate::error::{DbError, Result};
use crate::keycode::{self, IndexValue, PrimaryKey, PRIMARY_KEY_LEN};

const PRIMARY_TAG: u8 = 0x01;
const INDEX_TAG: u8 = 0x02;
const SEQUENCE_TAG: u8 = 0x03;
const SCHEMA_TAG: u8 = 0x04;

/// Precomputed key prefixes of one collection
#[derive(Debug, Clone)]
pub(crate) struct CollectionKeys {
    primary_prefix: Vec<u8>,
    sequence_key: Vec<u8>,
    schema_key: Vec<u8>,
    /// `(field, prefix)` in declaration order
    index_prefixes: Vec<(String, Vec<u8>)>,
}

impl CollectionKeys {
    pub(crate) fn new<'a>(
        collection: &str,
        fields: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self> {
        let mut primary_prefix = vec![PRIMARY_TAG];
        push_name(&mut primary_prefix, collection)?;

        let mut sequence_key = vec![SEQUENCE_TAG];
        push_name(&mut sequence_key, collection)?;

        let mut schema_key = vec![SCHEMA_TAG];
        push_name(&mut schema_key, collection)?;

        let mut index_prefixes = Vec::new();
        for field in fields {
            let mut prefix = vec![INDEX_TAG];
            push_name(&mut prefix, collection)?;
            push_name(&mut prefix, field)?;
            index_prefixes.push((field.to_string(), prefix));
        }

        Ok(Self {
            primary_prefix,
            sequence_key,
            schema_key,
            index_prefixes,
        })
    }

    pub(crate) fn primary_prefix(&self) -> &[u8] {
        &self.primary_prefix
    }

    pub(crate) fn primary_key(&self, id: PrimaryKey) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.primary_prefix.len() + PRIMARY_KEY_LEN);
        key.extend_from_slice(&self.primary_prefix);
        key.extend_from_slice(&keycode::encode_primary_key(id));
        key
    }

    pub(crate) fn sequence_key(&self) -> &[u8] {
        &self.sequence_key
    }

    pub(crate) fn schema_key(&self) -> &[u8] {
        &self.schema_key
    }

    /// Prefix shared by every entry of `field` with exactly `value`
    pub(crate) fn index_value_prefix(&self, field: &str, value: &IndexValue) -> Option<Vec<u8>> {
        let prefix = self.index_prefix(field)?;
        let mut key = prefix.to_vec();
        key.extend_from_slice(&value.encode());
        Some(key)
    }

    pub(crate) fn index_key(&self, field: &str, value: &IndexValue, id: PrimaryKey) -> Option<Vec<u8>> {
        let mut key = self.index_value_prefix(field, value)?;
        key.extend_from_slice(&keycode::encode_primary_key(id));
        Some(key)
    }

    fn index_prefix(&self, field: &str) -> Option<&[u8]> {
        self.index_prefixes
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, prefix)| prefix.as_slice())
    }
}

/// Id stored in the last [`PRIMARY_KEY_LEN`] bytes of a key
pub(crate) fn trailing_id(key: &[u8]) -> Result<PrimaryKey> {
    if key.len() < PRIMARY_KEY_LEN {
        return Err(DbError::InvalidKey(format!(
            "key of {} bytes has no id suffix",
            key.len()
        )));
    }
    keycode::decode_primary_key(&key[key.len() - PRIMARY_KEY_LEN..])
}

fn push_name(buf: &mut Vec<u8>, name: &str) -> Result<()> {
    let len = u16::try_from(name.len())
        .map_err(|_| DbError::Config(format!("name too long: {} bytes", name.len())))?;
    buf.extend_from_slice(&len.to_be_bytes());
    buf.extend_from_slice(name.as_bytes());
    Ok(())
}
