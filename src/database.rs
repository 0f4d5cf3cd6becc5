//! Database Handle
//!
//! Owns the opened engine and its open/closed lifecycle. Typed
//! [`Collection`]s are handed out from here and share the lifecycle: once
//! the database is closed every collection and cursor fails with
//! [`DbError::Closed`].
//!
//! ## Lifecycle
//! ```text
//!   open ──► Open ──close──► Closed
//!             │                 ▲
//!             └─ ops take a ────┘ close waits for them,
//!                shared guard     new ops fail fast
//! ```

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::codec::Codec;
use crate::collection::Collection;
use crate::config::Config;
use crate::engine::Engine;
use crate::error::{DbError, Result};
use crate::schema::Schema;

/// Handle to an open store; cheap to clone
#[derive(Clone)]
pub struct Database {
    inner: Arc<Shared>,
}

struct Shared {
    data_dir: PathBuf,
    /// Set first on close so new operations fail without waiting
    closed: AtomicBool,
    /// `None` once closed; operations hold a read guard while running
    engine: RwLock<Option<Engine>>,
}

impl Database {
    /// Open (or create) a store with the given config
    ///
    /// Fails with a storage error if the location cannot be created or
    /// its files cannot be read.
    pub fn open(config: Config) -> Result<Self> {
        let data_dir = config.data_dir.clone();
        let engine = Engine::open(config)?;

        tracing::info!("Database opened at {}", data_dir.display());

        Ok(Self {
            inner: Arc::new(Shared {
                data_dir,
                closed: AtomicBool::new(false),
                engine: RwLock::new(Some(engine)),
            }),
        })
    }

    /// Open with default settings at `path`
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open(Config::builder().data_dir(path.as_ref()).build())
    }

    /// Typed handle for one record type
    pub fn collection<T: 'static>(&self, schema: Schema<T>, codec: Codec<T>) -> Result<Collection<T>> {
        self.ensure_open()?;
        Collection::new(self.clone(), schema, codec)
    }

    /// Flush buffered writes to an SSTable
    pub fn flush(&self) -> Result<()> {
        self.with_engine(|engine| engine.flush())
    }

    /// Close the store
    ///
    /// New operations fail with `Closed` immediately; in-flight ones are
    /// allowed to finish before the engine is flushed and released. Closing
    /// twice fails with `Closed`.
    pub fn close(&self) -> Result<()> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Err(DbError::Closed);
        }

        let engine = self.inner.engine.write().take();
        match engine {
            Some(engine) => {
                engine.close()?;
                tracing::info!("Database at {} closed", self.inner.data_dir.display());
                Ok(())
            }
            None => Err(DbError::Closed),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn data_dir(&self) -> &Path {
        &self.inner.data_dir
    }

    pub(crate) fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(DbError::Closed);
        }
        Ok(())
    }

    /// Run `f` against the engine, or fail with `Closed`
    ///
    /// `f` must not call back into `with_engine`.
    pub(crate) fn with_engine<R>(&self, f: impl FnOnce(&Engine) -> Result<R>) -> Result<R> {
        self.ensure_open()?;
        let guard = self.inner.engine.read();
        match guard.as_ref() {
            Some(engine) => f(engine),
            None => Err(DbError::Closed),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("data_dir", &self.inner.data_dir)
            .field("closed", &self.is_closed())
            .finish()
    }
}
