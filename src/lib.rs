//! # AtlasDB
//!
//! An embeddable typed object store with:
//! - Typed collections with caller-supplied codecs
//! - Secondary equality indexes kept in step with every write
//! - Order-preserving key encoding for ints and strings
//! - Write-Ahead Logging (WAL) with atomic multi-key batches
//! - Crash recovery with partial write handling
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Database / Collection<T>                     │
//! │          (Schema + Codec, Cursor over snapshots)             │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  keyspace: primary / index / sequence / schema
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        Engine                                │
//! │          (Single Writer, WriteBatch / Transaction)           │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Append)   │          │ (Snapshots) │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │   Storage   │
//!                           │  (SSTable)  │
//!                           └─────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use atlasdb::{Codec, Database, Schema};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Person { name: String, age: i64 }
//!
//! # fn main() -> atlasdb::Result<()> {
//! let db = Database::open_path("./people")?;
//! let people = db.collection(
//!     Schema::new("person").index("age", |p: &Person| p.age),
//!     Codec::json(),
//! )?;
//!
//! let id = people.add(&Person { name: "Ada".into(), age: 36 })?;
//! assert_eq!(people.get(id)?.name, "Ada");
//!
//! for (id, person) in people.iter_equal("age", 36)? {
//!     println!("{id}: {}", person?.name);
//! }
//! db.close()
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod snapshot;
pub mod engine;

pub mod keycode;
mod keyspace;
pub mod codec;
pub mod schema;
pub mod database;
pub mod collection;
pub mod cursor;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{DbError, Result};
pub use config::Config;
pub use engine::{Engine, Transaction, WriteBatch};
pub use snapshot::Snapshot;
pub use keycode::{IndexValue, PrimaryKey};
pub use codec::Codec;
pub use schema::Schema;
pub use database::Database;
pub use collection::Collection;
pub use cursor::{Cursor, CursorStatus};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
