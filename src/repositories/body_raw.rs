use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, Set,
};
use uuid::Uuid;

use crate::entity::http_body_raw::{self, ActiveModel, Column, Entity as BodyRawEntity};
use crate::error::{AppError, AppResult};
use crate::models::BodyRaw;
use crate::repositories::Repository;

pub struct BodyRawRepository;

#[async_trait]
impl Repository<BodyRaw> for BodyRawRepository {
    async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<BodyRaw> {
        let model = BodyRawEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("BodyRaw".to_string()))?;

        Ok(model.into())
    }

    async fn find_many(db: &DatabaseConnection, ids: &[Uuid]) -> AppResult<Vec<BodyRaw>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = BodyRawEntity::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

impl BodyRawRepository {
    /// The raw body of a request, if it has one
    pub async fn find_by_http(db: &DatabaseConnection, http_id: Uuid) -> AppResult<Option<BodyRaw>> {
        let model = BodyRawEntity::find()
            .filter(Column::HttpId.eq(http_id))
            .one(db)
            .await?;

        Ok(model.map(|m| m.into()))
    }

    pub async fn list_by_https(
        db: &DatabaseConnection,
        http_ids: &[Uuid],
    ) -> AppResult<Vec<BodyRaw>> {
        if http_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = BodyRawEntity::find()
            .filter(Column::HttpId.is_in(http_ids.iter().copied()))
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    pub fn tx(txn: &DatabaseTransaction) -> BodyRawWriter<'_> {
        BodyRawWriter { txn }
    }
}

pub struct BodyRawWriter<'a> {
    txn: &'a DatabaseTransaction,
}

impl BodyRawWriter<'_> {
    pub async fn insert_many(&self, rows: &[BodyRaw]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        BodyRawEntity::insert_many(rows.iter().map(to_active))
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }

    pub async fn update(&self, row: &BodyRaw) -> AppResult<()> {
        let result = BodyRawEntity::update_many()
            .set(to_active(row))
            .filter(Column::Id.eq(row.id))
            .exec(self.txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("BodyRaw".to_string()));
        }

        Ok(())
    }

    pub async fn delete_many(&self, ids: &[Uuid]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = BodyRawEntity::delete_many()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .exec(self.txn)
            .await?;

        Ok(result.rows_affected)
    }
}

fn to_active(b: &BodyRaw) -> ActiveModel {
    ActiveModel {
        id: Set(b.id),
        http_id: Set(b.http_id),
        raw_data: Set(b.raw_data.clone()),
        delta_raw_data: Set(b.delta_raw_data.clone()),
        is_delta: Set(b.is_delta),
        created_at: Set(b.created_at),
        updated_at: Set(b.updated_at),
    }
}

impl From<http_body_raw::Model> for BodyRaw {
    fn from(m: http_body_raw::Model) -> Self {
        Self {
            id: m.id,
            http_id: m.http_id,
            raw_data: m.raw_data,
            delta_raw_data: m.delta_raw_data,
            is_delta: m.is_delta,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
