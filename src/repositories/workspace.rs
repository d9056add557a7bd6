use async_trait::async_trait;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use uuid::Uuid;

use crate::entity::workspace::{self, Column, Entity as WorkspaceEntity};
use crate::entity::workspace_user::{self, Entity as WorkspaceUserEntity};
use crate::entity::Role;
use crate::error::{AppError, AppResult};
use crate::models::{Workspace, WorkspaceMember};
use crate::repositories::Repository;

/// Workspaces and their membership
pub struct WorkspaceRepository;

#[async_trait]
impl Repository<Workspace> for WorkspaceRepository {
    async fn find_by_id(db: &DatabaseConnection, id: Uuid) -> AppResult<Workspace> {
        let model = WorkspaceEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| AppError::NotFound("Workspace".to_string()))?;

        Ok(model.into())
    }

    async fn find_many(db: &DatabaseConnection, ids: &[Uuid]) -> AppResult<Vec<Workspace>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = WorkspaceEntity::find()
            .filter(Column::Id.is_in(ids.iter().copied()))
            .order_by_asc(Column::Id)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }
}

impl WorkspaceRepository {
    /// Role of `user_id` in `workspace_id`, `None` when not a member
    pub async fn find_role(
        db: &DatabaseConnection,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> AppResult<Option<Role>> {
        let member = WorkspaceUserEntity::find()
            .filter(workspace_user::Column::WorkspaceId.eq(workspace_id))
            .filter(workspace_user::Column::UserId.eq(user_id))
            .one(db)
            .await?;

        Ok(member.map(|m| m.role))
    }

    /// Memberships of a user
    pub async fn list_memberships(
        db: &DatabaseConnection,
        user_id: Uuid,
    ) -> AppResult<Vec<WorkspaceMember>> {
        let models = WorkspaceUserEntity::find()
            .filter(workspace_user::Column::UserId.eq(user_id))
            .order_by_asc(workspace_user::Column::WorkspaceId)
            .all(db)
            .await?;

        Ok(models.into_iter().map(|m| m.into()).collect())
    }

    /// IDs of every workspace the user belongs to
    pub async fn workspace_ids_for_user(
        db: &DatabaseConnection,
        user_id: Uuid,
    ) -> AppResult<Vec<Uuid>> {
        let ids = WorkspaceUserEntity::find()
            .select_only()
            .column(workspace_user::Column::WorkspaceId)
            .filter(workspace_user::Column::UserId.eq(user_id))
            .into_tuple::<Uuid>()
            .all(db)
            .await?;

        Ok(ids)
    }

    pub fn tx(txn: &DatabaseTransaction) -> WorkspaceWriter<'_> {
        WorkspaceWriter { txn }
    }
}

pub struct WorkspaceWriter<'a> {
    txn: &'a DatabaseTransaction,
}

impl WorkspaceWriter<'_> {
    pub async fn insert(&self, ws: &Workspace) -> AppResult<()> {
        let model = workspace::ActiveModel {
            id: Set(ws.id),
            name: Set(ws.name.clone()),
            global_env_id: Set(ws.global_env_id),
            created_at: Set(ws.created_at),
            updated_at: Set(ws.updated_at),
        };

        WorkspaceEntity::insert(model)
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }

    pub async fn insert_member(&self, member: &WorkspaceMember) -> AppResult<()> {
        let model = workspace_user::ActiveModel {
            id: Set(member.id),
            workspace_id: Set(member.workspace_id),
            user_id: Set(member.user_id),
            role: Set(member.role),
        };

        WorkspaceUserEntity::insert(model)
            .exec_without_returning(self.txn)
            .await?;

        Ok(())
    }
}

impl From<workspace::Model> for Workspace {
    fn from(m: workspace::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            global_env_id: m.global_env_id,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}

impl From<workspace_user::Model> for WorkspaceMember {
    fn from(m: workspace_user::Model) -> Self {
        Self {
            id: m.id,
            workspace_id: m.workspace_id,
            user_id: m.user_id,
            role: m.role,
        }
    }
}
