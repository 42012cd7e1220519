mod chunk_repo;
mod file_repo;
mod replica_repo;
mod share_repo;

pub use chunk_repo::*;
pub use file_repo::*;
pub use replica_repo::*;
pub use share_repo::*;

use async_trait::async_trait;
use sqlx::{Any, AnyPool, Pool, any::install_default_drivers, migrate::MigrateError};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DataStoreError>;

/// `DataStore` is the coordinator's handle onto the Metadata Store contract
/// (§4.2): one pooled connection, one set of migrations, one place that
/// knows how File/Chunk/Replica/Share rows are shaped on disk.
///
/// ### Architectural intent
/// A single `AnyPool` wrapper with generic `Persist`/`Fetch` traits per
/// record type, rather than a bespoke repository struct per table. This
/// keeps connection lifecycle management centralized and lets callers pass
/// around one `&DataStore` instead of four repository handles.
pub struct DataStore {
    pool: Pool<Any>,
}

impl DataStore {
    /// Connects to `url` (any sqlx::Any-compatible DSN) and runs migrations.
    pub async fn new(url: &str) -> Result<Self> {
        install_default_drivers();
        let pool = AnyPool::connect(url).await?;
        // Best-effort: only SQLite honors this pragma, and the Any driver
        // happily forwards it to whichever backend is actually connected.
        let _ = sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn from_pool(pool: Pool<Any>) -> Result<Self> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Any> {
        &self.pool
    }
}

/// Write-only interface for persisting rows of a given record type (§4.2).
///
/// Writing is destructive and requires strict coordination, so batch inserts
/// are grouped into a single transaction to bound round trips during
/// high-throughput operations like a multi-chunk upload.
#[async_trait]
pub trait Persist<Data: Send + Sync> {
    async fn store_all(&self, items: Vec<Data>) -> Result<()>;
    async fn store(&self, item: Data) -> Result<()>;
}

/// Read-only interface for retrieving rows of a given record type by key.
#[async_trait]
pub trait Fetch<ID: Send + Sync, Data: Send + Sync> {
    async fn fetch_by(&self, key: &ID) -> Result<Data>;
    async fn fetch_many(&self, keys: &[ID]) -> Result<Vec<Data>>;
}

#[derive(Error, Debug)]
pub enum DataStoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] MigrateError),
    #[error("requested record was not found in the store")]
    NotFound,
    #[error("invariant violation: {0}")]
    Fatal(String),
}

/// Current instant rendered as RFC 3339 text, the timestamp format every
/// table in this store uses.
pub fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

#[cfg(test)]
pub(crate) async fn setup() -> DataStore {
    DataStore::new("sqlite::memory:")
        .await
        .expect("failed to create test store")
}
