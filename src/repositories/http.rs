use async_trait::async_trait;
use sea_orm::sea_query::{Condition, Expr};
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    NotSet, QueryFilter, QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::http::{self, ActiveModel, Column, Entity as HttpEntity};
use crate::error::{AppError, AppResult};
use crate::models::Http;
use crate::repositories::Repository;

/// Request repository
pub struct HttpRepository;

#[async_trait]
impl Repository<Http> for HttpRepository {
    async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<Http> {
        let model = HttpEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Http".to_string()))?;

        Ok(model.into())
    }

    async fn find_many(db: &DatabaseConnection, ids: &[Uuid]) -> AppResult<Vec<Http>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = HttpEntity::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

impl HttpRepository {
    /// Requests of the given workspaces, snapshots excluded
    pub async fn list_by_workspaces(
        db: &DatabaseConnection,
        workspace_ids: &[Uuid],
    ) -> AppResult<Vec<Http>> {
        if workspace_ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = HttpEntity::find()
            .filter(Column::WorkspaceId.is_in(workspace_ids.iter().copied()))
            .filter(Column::IsSnapshot.eq(false))
            .order_by_asc(Column::DisplayOrder)
            .order_by_asc(Column::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    /// IDs of every request of the given workspaces, snapshots included
    pub async fn ids_by_workspaces(
        db: &DatabaseConnection,
        workspace_ids: &[Uuid],
    ) -> AppResult<Vec<Uuid>> {
        if workspace_ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids = HttpEntity::find()
            .select_only()
            .column(Column::Id)
            .filter(Column::WorkspaceId.is_in(workspace_ids.iter().copied()))
            .into_tuple::<Uuid>()
            .all(db)
            .await?;

        Ok(ids)
    }

    pub fn tx(txn: &DatabaseTransaction) -> HttpWriter<'_> {
        HttpWriter { txn }
    }
}

/// Transaction-scoped request writes
pub struct HttpWriter<'a> {
    txn: &'a DatabaseTransaction,
}

impl HttpWriter<'_> {
    pub async fn insert_many(&self, rows: &[Http]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        HttpEntity::insert_many(rows.iter().map(to_active))
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }

    /// Overwrite the editable columns of an existing row. `last_run_at`
    /// only moves through [`Self::touch_last_run`].
    pub async fn update(&self, row: &Http) -> AppResult<()> {
        let active = ActiveModel {
            last_run_at: NotSet,
            created_at: NotSet,
            ..to_active(row)
        };
        let result = HttpEntity::update_many()
            .set(active)
            .filter(Column::Id.eq(row.id))
            .exec(self.txn)
            .await?;

        if result.rows_affected == 0 {
            return Err(AppError::NotFound("Http".to_string()));
        }

        Ok(())
    }

    pub async fn delete_many(&self, ids: &[Uuid]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = HttpEntity::delete_many()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .exec(self.txn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Record a run time without ever moving `last_run_at` backwards
    pub async fn touch_last_run(&self, id: Uuid, at: i64) -> AppResult<()> {
        let newer = Condition::any()
            .add(Column::LastRunAt.is_null())
            .add(Column::LastRunAt.lt(at));

        HttpEntity::update_many()
            .col_expr(
                Column::LastRunAt,
                Expr::case(newer, Expr::val(at))
                    .finally(Expr::col(Column::LastRunAt))
                    .into(),
            )
            .filter(Column::Id.eq(id))
            .exec(self.txn)
            .await?;

        Ok(())
    }
}

fn to_active(h: &Http) -> ActiveModel {
    ActiveModel {
        id: Set(h.id),
        workspace_id: Set(h.workspace_id),
        name: Set(h.name.clone()),
        url: Set(h.url.clone()),
        method: Set(h.method.clone()),
        description: Set(h.description.clone()),
        body_kind: Set(h.body_kind),
        display_order: Set(h.display_order),
        last_run_at: Set(h.last_run_at),
        parent_http_id: Set(h.parent_http_id),
        is_delta: Set(h.is_delta),
        delta_name: Set(h.delta_name.clone()),
        delta_url: Set(h.delta_url.clone()),
        delta_method: Set(h.delta_method.clone()),
        delta_description: Set(h.delta_description.clone()),
        delta_body_kind: Set(h.delta_body_kind),
        is_snapshot: Set(h.is_snapshot),
        created_at: Set(h.created_at),
        updated_at: Set(h.updated_at),
    }
}

// Conversion from SeaORM model to our domain model
impl From<http::Model> for Http {
    fn from(m: http::Model) -> Self {
        Self {
            id: m.id,
            workspace_id: m.workspace_id,
            name: m.name,
            url: m.url,
            method: m.method,
            description: m.description,
            body_kind: m.body_kind,
            display_order: m.display_order,
            last_run_at: m.last_run_at,
            parent_http_id: m.parent_http_id,
            is_delta: m.is_delta,
            delta_name: m.delta_name,
            delta_url: m.delta_url,
            delta_method: m.delta_method,
            delta_description: m.delta_description,
            delta_body_kind: m.delta_body_kind,
            is_snapshot: m.is_snapshot,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
