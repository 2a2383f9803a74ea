use async_trait::async_trait;
use pca_core::{Category, Plan, PlanItem, Record};
use thiserror::Error;
use tracing::debug;

mod memory;
mod postgres;
mod snapshot;

pub use memory::{MemoryPlanStore, MemoryPlanTransaction};
pub use postgres::{PgPlanStore, PgPlanTransaction};
pub use snapshot::{PageSnapshotStore, StoredSnapshot};

pub const CRATE_NAME: &str = "pca-storage";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("no {entity} stored for key {key}")]
    NotFound { entity: &'static str, key: String },
    #[error("{entity} already stored for key {key}")]
    Duplicate { entity: &'static str, key: String },
}

impl StorageError {
    fn not_found<R: Record>(key: &R::Key) -> Self {
        Self::NotFound {
            entity: R::ENTITY,
            key: format!("{key:?}"),
        }
    }

    fn duplicate<R: Record>(key: &R::Key) -> Self {
        Self::Duplicate {
            entity: R::ENTITY,
            key: format!("{key:?}"),
        }
    }
}

#[async_trait]
pub trait RecordStore<R: Record>: Send {
    async fn find(&mut self, key: &R::Key) -> Result<Option<R>, StorageError>;
    async fn create(&mut self, key: &R::Key, values: &R::Values) -> Result<R, StorageError>;
    async fn update(&mut self, key: &R::Key, values: &R::Values) -> Result<R, StorageError>;
}

/// A unit of work spanning a whole crawl run. Dropping it without `commit` discards it.
#[async_trait]
pub trait PlanTransaction:
    RecordStore<Category> + RecordStore<Plan> + RecordStore<PlanItem> + Sized + Send
{
    async fn commit(self) -> Result<(), StorageError>;
    async fn rollback(self) -> Result<(), StorageError>;
}

#[async_trait]
pub trait PlanStore: Send + Sync {
    type Tx: PlanTransaction;

    async fn begin(&self) -> Result<Self::Tx, StorageError>;
}

/// Find-or-create by natural key, refreshing the mutable fields of an existing row.
///
/// Returns the stored record and whether it was created by this call. Running it twice
/// with the same arguments leaves exactly one row with the same values.
pub async fn upsert<R, S>(
    store: &mut S,
    key: &R::Key,
    values: &R::Values,
) -> Result<(R, bool), StorageError>
where
    R: Record,
    S: RecordStore<R> + ?Sized,
{
    match store.find(key).await? {
        Some(_) => {
            debug!(entity = R::ENTITY, ?key, "updating existing record");
            Ok((store.update(key, values).await?, false))
        }
        None => {
            debug!(entity = R::ENTITY, ?key, "creating record");
            Ok((store.create(key, values).await?, true))
        }
    }
}
