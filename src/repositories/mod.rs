pub mod assert;
pub mod body_raw;
pub mod environment;
pub mod http;
pub mod key_value;
pub mod response;
pub mod user;
pub mod version;
pub mod workspace;

pub use assert::{AssertRepository, AssertWriter};
pub use body_raw::{BodyRawRepository, BodyRawWriter};
pub use environment::{EnvironmentRepository, EnvironmentWriter};
pub use http::{HttpRepository, HttpWriter};
pub use key_value::{KeyValueRepository, KeyValueWriter};
pub use response::{ResponseRepository, ResponseWriter};
pub use user::UserRepository;
pub use version::{VersionRepository, VersionWriter};
pub use workspace::{WorkspaceRepository, WorkspaceWriter};

use async_trait::async_trait;
use sea_orm::{DatabaseConnection, DatabaseTransaction, TransactionTrait};
use uuid::Uuid;

use crate::error::AppResult;

/// Pooled readers shared by the entity repositories.
///
/// Readers take the pool and writers take a transaction, so a read issued
/// inside a write window does not type-check.
#[async_trait]
pub trait Repository<T>
where
    T: Send + Sync,
{
    /// Find entity by ID
    async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<T>;

    /// Find every entity whose ID is in `ids`; missing IDs are skipped
    async fn find_many(db: &DatabaseConnection, ids: &[Uuid]) -> AppResult<Vec<T>>;
}

/// Open the write transaction of one CRUD call
pub async fn begin(db: &DatabaseConnection) -> AppResult<DatabaseTransaction> {
    Ok(db.begin().await?)
}

/// Commit a write transaction; dropping it instead rolls back
pub async fn commit(txn: DatabaseTransaction) -> AppResult<()> {
    Ok(txn.commit().await?)
}
