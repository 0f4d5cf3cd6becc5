//! Record type declarations
//!
//! A [`Schema`] names a record type and lists its secondary indexes. Each
//! index is a field name plus a function pulling that field's value out of
//! a record, declared up front:
//!
//! ```
//! use atlasdb::Schema;
//!
//! struct Person { name: String, age: i64 }
//!
//! let schema = Schema::new("person")
//!     .index("age", |p: &Person| p.age)
//!     .index("name", |p: &Person| p.name.clone());
//! assert_eq!(schema.index_names().collect::<Vec<_>>(), ["age", "name"]);
//! ```

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::keycode::IndexValue;

type ExtractFn<T> = dyn Fn(&T) -> IndexValue + Send + Sync;

/// One secondary index: a field name and its extractor
pub struct IndexDescriptor<T> {
    field: String,
    extract: Arc<ExtractFn<T>>,
}

impl<T> IndexDescriptor<T> {
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Value of the indexed field in `record`
    pub fn extract(&self, record: &T) -> IndexValue {
        (self.extract)(record)
    }
}

impl<T> Clone for IndexDescriptor<T> {
    fn clone(&self) -> Self {
        Self {
            field: self.field.clone(),
            extract: Arc::clone(&self.extract),
        }
    }
}

impl<T> fmt::Debug for IndexDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexDescriptor")
            .field("field", &self.field)
            .finish()
    }
}

/// Static description of a record type namespace
pub struct Schema<T> {
    name: String,
    indexes: Vec<IndexDescriptor<T>>,
}

impl<T: 'static> Schema<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            indexes: Vec::new(),
        }
    }

    /// Declare a secondary index on `field`
    pub fn index<F, V>(mut self, field: impl Into<String>, extract: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: Into<IndexValue>,
    {
        self.indexes.push(IndexDescriptor {
            field: field.into(),
            extract: Arc::new(move |record: &T| -> IndexValue { extract(record).into() }),
        });
        self
    }
}

impl<T> Schema<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indexes(&self) -> &[IndexDescriptor<T>] {
        &self.indexes
    }

    pub fn index_names(&self) -> impl Iterator<Item = &str> {
        self.indexes.iter().map(IndexDescriptor::field)
    }

    pub fn has_index(&self, field: &str) -> bool {
        self.indexes.iter().any(|ix| ix.field == field)
    }

    /// Reject empty names and duplicate index fields
    pub(crate) fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DbError::Config("collection name must not be empty".to_string()));
        }

        let mut seen = HashSet::new();
        for index in &self.indexes {
            if index.field.is_empty() {
                return Err(DbError::Config(format!(
                    "collection '{}' declares an index with an empty field name",
                    self.name
                )));
            }
            if !seen.insert(index.field.as_str()) {
                return Err(DbError::Config(format!(
                    "collection '{}' declares index '{}' twice",
                    self.name, index.field
                )));
            }
        }

        Ok(())
    }
}

impl<T> Clone for Schema<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            indexes: self.indexes.clone(),
        }
    }
}

impl<T> fmt::Debug for Schema<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("name", &self.name)
            .field("indexes", &self.indexes)
            .finish()
    }
}
