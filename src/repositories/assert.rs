use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::entity::http_assert::{self, ActiveModel, Column, Entity as AssertEntity};
use crate::error::{AppError, AppResult};
use crate::models::Assert;
use crate::repositories::Repository;

/// Assertion repository
pub struct AssertRepository;

#[async_trait]
impl Repository<Assert> for AssertRepository {
    async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<Assert> {
        let model = AssertEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Assert".to_string()))?;

        Ok(model.into())
    }

    async fn find_many(db: &DatabaseConnection, ids: &[Uuid]) -> AppResult<Vec<Assert>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = AssertEntity::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

impl AssertRepository {
    pub async fn list_by_http(db: &DatabaseConnection, http_id: Uuid) -> AppResult<Vec<Assert>> {
        Self::list_by_https(db, &[http_id]).await
    }

    pub async fn list_by_https(
        db: &DatabaseConnection,
        http_ids: &[Uuid],
    ) -> AppResult<Vec<Assert>> {
        if http_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = AssertEntity::find()
            .filter(Column::HttpId.is_in(http_ids.iter().copied()))
            .order_by_asc(Column::DisplayOrder)
            .order_by_asc(Column::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    pub fn tx(txn: &DatabaseTransaction) -> AssertWriter<'_> {
        AssertWriter { txn }
    }
}

pub struct AssertWriter<'a> {
    txn: &'a DatabaseTransaction,
}

impl AssertWriter<'_> {
    pub async fn insert_many(&self, rows: &[Assert]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        AssertEntity::insert_many(rows.iter().map(to_active))
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }

    pub async fn update(&self, row: &Assert) -> AppResult<()> {
        let result = AssertEntity::update_many()
            .set(to_active(row))
            .filter(Column::Id.eq(row.id))
            .exec(self.txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Assert".to_string()));
        }

        Ok(())
    }

    pub async fn delete_many(&self, ids: &[Uuid]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = AssertEntity::delete_many()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .exec(self.txn)
            .await?;

        Ok(result.rows_affected)
    }
}

fn to_active(a: &Assert) -> ActiveModel {
    ActiveModel {
        id: Set(a.id),
        http_id: Set(a.http_id),
        value: Set(a.value.clone()),
        enabled: Set(a.enabled),
        description: Set(a.description.clone()),
        display_order: Set(a.display_order),
        is_delta: Set(a.is_delta),
        parent_http_assert_id: Set(a.parent_id),
        delta_value: Set(a.delta_value.clone()),
        delta_enabled: Set(a.delta_enabled),
        delta_description: Set(a.delta_description.clone()),
        delta_display_order: Set(a.delta_display_order),
    }
}

impl From<http_assert::Model> for Assert {
    fn from(m: http_assert::Model) -> Self {
        Self {
            id: m.id,
            http_id: m.http_id,
            value: m.value,
            enabled: m.enabled,
            description: m.description,
            display_order: m.display_order,
            is_delta: m.is_delta,
            parent_id: m.parent_http_assert_id,
            delta_value: m.delta_value,
            delta_enabled: m.delta_enabled,
            delta_description: m.delta_description,
            delta_display_order: m.delta_display_order,
        }
    }
}
