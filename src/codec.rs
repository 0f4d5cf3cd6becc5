//! Codec Adapter
//!
//! A record codec is a pair of caller-supplied functions, one turning a
//! record into bytes and one turning bytes back into a record. The store
//! never looks inside the bytes, so any format works and can be swapped
//! without touching the storage code.
//!
//! ```
//! use atlasdb::Codec;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Note { text: String }
//!
//! let json: Codec<Note> = Codec::json();
//! let custom: Codec<String> = Codec::new(
//!     |s: &String| Ok::<_, std::io::Error>(s.as_bytes().to_vec()),
//!     |b: &[u8]| String::from_utf8(b.to_vec()),
//! );
//! # let _ = (json, custom);
//! ```

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DbError, Result};

/// Error type returned by codec functions
pub type CodecError = Box<dyn std::error::Error + Send + Sync>;

type EncodeFn<T> = dyn Fn(&T) -> std::result::Result<Vec<u8>, CodecError> + Send + Sync;
type DecodeFn<T> = dyn Fn(&[u8]) -> std::result::Result<T, CodecError> + Send + Sync;

/// Encode/decode pair used for every record payload of one type
pub struct Codec<T> {
    name: &'static str,
    encode: Arc<EncodeFn<T>>,
    decode: Arc<DecodeFn<T>>,
}

impl<T: 'static> Codec<T> {
    /// Build a codec from two functions
    pub fn new<E, D, EE, DE>(encode: E, decode: D) -> Self
    where
        E: Fn(&T) -> std::result::Result<Vec<u8>, EE> + Send + Sync + 'static,
        D: Fn(&[u8]) -> std::result::Result<T, DE> + Send + Sync + 'static,
        EE: Into<CodecError>,
        DE: Into<CodecError>,
    {
        Self {
            name: "custom",
            encode: Arc::new(move |value: &T| -> std::result::Result<Vec<u8>, CodecError> {
                encode(value).map_err(Into::into)
            }),
            decode: Arc::new(move |bytes: &[u8]| -> std::result::Result<T, CodecError> {
                decode(bytes).map_err(Into::into)
            }),
        }
    }
}

impl<T> Codec<T> {
    /// Label shown in `Debug` output and logs
    pub fn with_name(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Serialize a record; failures become `DbError::Encoding`
    pub fn encode(&self, value: &T) -> Result<Vec<u8>> {
        (self.encode)(value).map_err(|e| DbError::Encoding(e.to_string()))
    }

    /// Deserialize a record; failures become `DbError::Decoding`
    pub fn decode(&self, bytes: &[u8]) -> Result<T> {
        (self.decode)(bytes).map_err(|e| DbError::Decoding(e.to_string()))
    }
}

impl<T: Serialize + DeserializeOwned + 'static> Codec<T> {
    /// JSON payloads via `serde_json`
    pub fn json() -> Self {
        Codec::new(
            |value: &T| serde_json::to_vec(value),
            |bytes: &[u8]| serde_json::from_slice::<T>(bytes),
        )
        .with_name("json")
    }

    /// Compact binary payloads via `bincode`
    pub fn bincode() -> Self {
        Codec::new(
            |value: &T| bincode::serialize(value),
            |bytes: &[u8]| bincode::deserialize::<T>(bytes),
        )
        .with_name("bincode")
    }
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            encode: Arc::clone(&self.encode),
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> fmt::Debug for Codec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec").field("name", &self.name).finish()
    }
}
