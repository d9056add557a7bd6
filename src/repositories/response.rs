use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::entity::http_response::{self, Column, Entity as ResponseEntity};
use crate::entity::http_response_assert::{self, Entity as ResponseAssertEntity};
use crate::entity::http_response_header::{self, Entity as ResponseHeaderEntity};
use crate::error::{AppError, AppResult};
use crate::models::{Response, ResponseAssert, ResponseHeader};
use crate::repositories::Repository;

/// Responses and their headers and assertion results. Append-only.
pub struct ResponseRepository;

#[async_trait]
impl Repository<Response> for ResponseRepository {
    async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<Response> {
        let model = ResponseEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Response".to_string()))?;

        Ok(model.into())
    }

    async fn find_many(db: &DatabaseConnection, ids: &[Uuid]) -> AppResult<Vec<Response>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = ResponseEntity::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

impl ResponseRepository {
    /// Responses of the given requests, newest first
    pub async fn list_by_https(
        db: &DatabaseConnection,
        http_ids: &[Uuid],
    ) -> AppResult<Vec<Response>> {
        if http_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = ResponseEntity::find()
            .filter(Column::HttpId.is_in(http_ids.iter().copied()))
            .order_by_desc(Column::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    pub async fn list_headers(
        db: &DatabaseConnection,
        response_ids: &[Uuid],
    ) -> AppResult<Vec<ResponseHeader>> {
        if response_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = ResponseHeaderEntity::find()
            .filter(http_response_header::Column::ResponseId.is_in(response_ids.iter().copied()))
            .order_by_asc(http_response_header::Column::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    pub async fn list_asserts(
        db: &DatabaseConnection,
        response_ids: &[Uuid],
    ) -> AppResult<Vec<ResponseAssert>> {
        if response_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = ResponseAssertEntity::find()
            .filter(http_response_assert::Column::ResponseId.is_in(response_ids.iter().copied()))
            .order_by_asc(http_response_assert::Column::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    pub fn tx(txn: &DatabaseTransaction) -> ResponseWriter<'_> {
        ResponseWriter { txn }
    }
}

pub struct ResponseWriter<'a> {
    txn: &'a DatabaseTransaction,
}

impl ResponseWriter<'_> {
    pub async fn insert(&self, response: &Response) -> AppResult<()> {
        let model = http_response::ActiveModel {
            id: Set(response.id),
            http_id: Set(response.http_id),
            status: Set(response.status),
            body: Set(response.body.clone()),
            time: Set(response.time),
            duration_ms: Set(response.duration_ms),
            size: Set(response.size),
            created_at: Set(response.created_at),
        };

        ResponseEntity::insert(model)
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }

    pub async fn insert_headers(&self, headers: &[ResponseHeader]) -> AppResult<()> {
        if headers.is_empty() {
            return Ok(());
        }

        let models = headers.iter().map(|h| http_response_header::ActiveModel {
            id: Set(h.id),
            response_id: Set(h.response_id),
            header_key: Set(h.header_key.clone()),
            header_value: Set(h.header_value.clone()),
        });

        ResponseHeaderEntity::insert_many(models)
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }

    pub async fn insert_asserts(&self, results: &[ResponseAssert]) -> AppResult<()> {
        if results.is_empty() {
            return Ok(());
        }

        let models = results.iter().map(|r| http_response_assert::ActiveModel {
            id: Set(r.id),
            response_id: Set(r.response_id),
            value: Set(r.value.clone()),
            success: Set(r.success),
            created_at: Set(r.created_at),
        });

        ResponseAssertEntity::insert_many(models)
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }
}

impl From<http_response::Model> for Response {
    fn from(m: http_response::Model) -> Self {
        Self {
            id: m.id,
            http_id: m.http_id,
            status: m.status,
            body: m.body,
            time: m.time,
            duration_ms: m.duration_ms,
            size: m.size,
            created_at: m.created_at,
        }
    }
}

impl From<http_response_header::Model> for ResponseHeader {
    fn from(m: http_response_header::Model) -> Self {
        Self {
            id: m.id,
            response_id: m.response_id,
            header_key: m.header_key,
            header_value: m.header_value,
        }
    }
}

impl From<http_response_assert::Model> for ResponseAssert {
    fn from(m: http_response_assert::Model) -> Self {
        Self {
            id: m.id,
            response_id: m.response_id,
            value: m.value,
            success: m.success,
            created_at: m.created_at,
        }
    }
}
