//! Order-preserving key encoding
//!
//! Maps index values to byte strings whose unsigned lexicographic order
//! equals the natural order of the values, so the engine's sorted keyspace
//! doubles as a sorted index.
//!
//! | value  | encoding                                   |
//! |--------|--------------------------------------------|
//! | `i64`  | 8 bytes big-endian, sign bit inverted      |
//! | `str`  | raw UTF-8 bytes (a prefix sorts first)     |
//! | id     | 8 bytes big-endian                         |
//!
//! String encodings are not prefix-free. That is fine for single-field
//! index keys, which are always followed by a fixed-width id, but a
//! composite key of several fields would need escaping or length prefixes.

use std::fmt;

use crate::error::{DbError, Result};

/// Primary key of a record: positive, increasing, never reused
pub type PrimaryKey = u64;

/// Width of an encoded primary key
pub const PRIMARY_KEY_LEN: usize = 8;

const SIGN_BIT: u64 = 1 << 63;

/// Encode a signed integer so byte order matches numeric order
pub fn encode_int(value: i64) -> [u8; 8] {
    ((value as u64) ^ SIGN_BIT).to_be_bytes()
}

/// Inverse of [`encode_int`]
pub fn decode_int(bytes: &[u8]) -> Result<i64> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| DbError::InvalidKey(format!("integer key must be 8 bytes, got {}", bytes.len())))?;
    Ok((u64::from_be_bytes(raw) ^ SIGN_BIT) as i64)
}

/// Encode a string so byte order matches lexicographic order
pub fn encode_string(value: &str) -> Vec<u8> {
    value.as_bytes().to_vec()
}

/// Encode a primary key (fixed width, big-endian)
pub fn encode_primary_key(id: PrimaryKey) -> [u8; 8] {
    id.to_be_bytes()
}

/// Decode a primary key from exactly [`PRIMARY_KEY_LEN`] bytes
pub fn decode_primary_key(bytes: &[u8]) -> Result<PrimaryKey> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| {
        DbError::InvalidKey(format!(
            "primary key must be {} bytes, got {}",
            PRIMARY_KEY_LEN,
            bytes.len()
        ))
    })?;
    Ok(u64::from_be_bytes(raw))
}

/// Value of an indexed field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IndexValue {
    Int(i64),
    Str(String),
}

impl IndexValue {
    /// Order-preserving encoding of the value
    pub fn encode(&self) -> Vec<u8> {
        match self {
            IndexValue::Int(i) => encode_int(*i).to_vec(),
            IndexValue::Str(s) => encode_string(s),
        }
    }
}

impl fmt::Display for IndexValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexValue::Int(i) => write!(f, "{}", i),
            IndexValue::Str(s) => write!(f, "{:?}", s),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for IndexValue {
                fn from(v: $t) -> Self {
                    IndexValue::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<&str> for IndexValue {
    fn from(v: &str) -> Self {
        IndexValue::Str(v.to_string())
    }
}

impl From<String> for IndexValue {
    fn from(v: String) -> Self {
        IndexValue::Str(v)
    }
}

impl From<&String> for IndexValue {
    fn from(v: &String) -> Self {
        IndexValue::Str(v.clone())
    }
}
