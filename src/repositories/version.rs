use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::entity::http_version::{self, ActiveModel, Column, Entity as VersionEntity};
use crate::error::{AppError, AppResult};
use crate::models::Version;
use crate::repositories::Repository;

pub struct VersionRepository;

#[async_trait]
impl Repository<Version> for VersionRepository {
    async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<Version> {
        let model = VersionEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Version".to_string()))?;

        Ok(model.into())
    }

    async fn find_many(db: &DatabaseConnection, ids: &[Uuid]) -> AppResult<Vec<Version>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = VersionEntity::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

impl VersionRepository {
    /// Versions of the given requests, newest first
    pub async fn list_by_https(
        db: &DatabaseConnection,
        http_ids: &[Uuid],
    ) -> AppResult<Vec<Version>> {
        if http_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = VersionEntity::find()
            .filter(Column::HttpId.is_in(http_ids.iter().copied()))
            .order_by_desc(Column::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    pub fn tx(txn: &DatabaseTransaction) -> VersionWriter<'_> {
        VersionWriter { txn }
    }
}

pub struct VersionWriter<'a> {
    txn: &'a DatabaseTransaction,
}

impl VersionWriter<'_> {
    pub async fn insert(&self, version: &Version) -> AppResult<()> {
        let model = ActiveModel {
            id: Set(version.id),
            http_id: Set(version.http_id),
            author_user_id: Set(version.author_user_id),
            name: Set(version.name.clone()),
            description: Set(version.description.clone()),
            created_at: Set(version.created_at),
        };

        VersionEntity::insert(model)
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }
}

impl From<http_version::Model> for Version {
    fn from(m: http_version::Model) -> Self {
        Self {
            id: m.id,
            http_id: m.http_id,
            author_user_id: m.author_user_id,
            name: m.name,
            description: m.description,
            created_at: m.created_at,
        }
    }
}
