//! Store handle and connection management

use crate::schema::CREATE_OBSERVATIONS;
use crate::StoreResult;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Observation store wrapping an sqlx SQLite pool.
///
/// The pool holds a single connection: writes come from one consumer loop
/// and an in-memory database only lives as long as its connection.
#[derive(Clone)]
pub struct ObservationStore {
    pool: SqlitePool,
}

impl ObservationStore {
    /// Open (creating if needed) the database file at `path`
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            // merge inputs are opened read-only, which WAL files do not allow cleanly
            .journal_mode(SqliteJournalMode::Delete);
        let store = Self::connect(opts).await?;
        info!(path = %path.display(), "opened observation store");
        Ok(store)
    }

    /// Open an existing database without write access (merge inputs)
    pub async fn open_read_only(path: impl AsRef<Path>) -> StoreResult<Self> {
        let opts = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .read_only(true);
        let pool = Self::pool_options().connect_with(opts).await?;
        Ok(Self { pool })
    }

    /// Private in-memory database, mostly for tests
    pub async fn in_memory() -> StoreResult<Self> {
        let opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(opts).await
    }

    async fn connect(opts: SqliteConnectOptions) -> StoreResult<Self> {
        let pool = Self::pool_options().connect_with(opts).await?;
        sqlx::query(CREATE_OBSERVATIONS).execute(&pool).await?;
        Ok(Self { pool })
    }

    fn pool_options() -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    }

    /// Get reference to underlying pool for direct queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Test the database connection
    pub async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Close the connection pool gracefully
    pub async fn close(self) {
        self.pool.close().await;
    }
}
