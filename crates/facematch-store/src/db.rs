//! Shared SQLite handle.
//!
//! The connection runs on its own thread behind `tokio-rusqlite`; every store
//! and ledger call is a single statement or transaction on that thread, so
//! readers never observe a partial write.

use std::path::Path;

use facematch_core::{Error, Result};

const SCHEMA_SQL: &str = include_str!("schema.sql");

const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = FULL;
    PRAGMA foreign_keys = ON;
";

/// Owned database handle, injected into [`DescriptorStore`](crate::DescriptorStore)
/// and [`RecognitionLedger`](crate::RecognitionLedger). Cheap to clone.
#[derive(Clone)]
pub struct Database {
    conn: tokio_rusqlite::Connection,
}

impl Database {
    /// Open (or create) the database file and apply the schema.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(Error::storage)?;
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .map_err(Error::storage)?;
        let db = Self::init(conn).await?;
        tracing::info!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// Private in-memory database, for tests and throwaway instances.
    pub async fn open_in_memory() -> Result<Self> {
        let conn = tokio_rusqlite::Connection::open_in_memory()
            .await
            .map_err(Error::storage)?;
        Self::init(conn).await
    }

    async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
        conn.call(|c| {
            c.execute_batch(PRAGMAS)?;
            c.execute_batch(SCHEMA_SQL)?;
            Ok(())
        })
        .await
        .map_err(Error::storage)?;
        Ok(Self { conn })
    }

    /// Run `f` on the connection thread.
    pub(crate) async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn
            .call(move |conn| Ok(f(conn)))
            .await
            .map_err(Error::storage)?
    }

    /// Flush and close the connection. Other clones of this handle fail
    /// with a storage error afterwards.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await.map_err(Error::storage)
    }
}
