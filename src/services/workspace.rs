use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::Role;
use crate::error::{AppError, AppResult};
use crate::ids;
use crate::models::{
    AddMember, CreateWorkspace, Environment, UpsertVariable, Variable, Workspace, WorkspaceMember,
    WorkspaceWithRole,
};
use crate::repositories::{
    self, EnvironmentRepository, Repository, UserRepository, WorkspaceRepository,
};
use crate::services::access::AccessService;

const GLOBAL_ENV_NAME: &str = "Global";

pub struct WorkspaceService;

impl WorkspaceService {
    /// Create a workspace with its global environment; the creator owns it
    pub async fn create(
        db: &DatabaseConnection,
        user_id: Uuid,
        input: CreateWorkspace,
    ) -> AppResult<WorkspaceWithRole> {
        let name = input.name.trim().to_string();
        if name.is_empty() {
            return Err(AppError::InvalidArgument("name is required".to_string()));
        }
        let id = match input.id.as_deref() {
            Some(raw) => ids::parse_id(raw, "id")?,
            None => ids::new_id(),
        };

        let now = ids::now_unix();
        let env = Environment {
            id: ids::new_id(),
            workspace_id: id,
            name: GLOBAL_ENV_NAME.to_string(),
            description: String::new(),
            created_at: now,
        };
        let workspace = Workspace {
            id,
            name,
            global_env_id: Some(env.id),
            created_at: now,
            updated_at: now,
        };
        let member = WorkspaceMember {
            id: ids::new_id(),
            workspace_id: id,
            user_id,
            role: Role::Owner,
        };

        let txn = repositories::begin(db).await?;
        let writer = WorkspaceRepository::tx(&txn);
        writer.insert(&workspace).await?;
        writer.insert_member(&member).await?;
        EnvironmentRepository::tx(&txn).insert(&env).await?;
        repositories::commit(txn).await?;

        tracing::info!(workspace_id = %workspace.id, %user_id, "workspace created");

        Ok(WorkspaceWithRole {
            workspace,
            role: Role::Owner,
        })
    }

    /// Workspaces the user belongs to, with the user's role in each
    pub async fn list(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<WorkspaceWithRole>> {
        let memberships = WorkspaceRepository::list_memberships(db, user_id).await?;
        let ids: Vec<Uuid> = memberships.iter().map(|m| m.workspace_id).collect();
        let workspaces = WorkspaceRepository::find_many(db, &ids).await?;

        Ok(workspaces
            .into_iter()
            .filter_map(|workspace| {
                memberships
                    .iter()
                    .find(|m| m.workspace_id == workspace.id)
                    .map(|m| WorkspaceWithRole {
                        role: m.role,
                        workspace,
                    })
            })
            .collect())
    }

    pub async fn add_member(
        db: &DatabaseConnection,
        user_id: Uuid,
        workspace_id: Uuid,
        input: AddMember,
    ) -> AppResult<WorkspaceMember> {
        let member_id = ids::parse_id(&input.user_id, "user_id")?;
        let caller = AccessService::check_write(db, user_id, workspace_id).await?;
        if input.role == Role::Owner && caller != Role::Owner {
            return Err(AppError::PermissionDenied(
                "only owners can add owners".to_string(),
            ));
        }
        UserRepository::find_by_id(db, member_id).await?;
        if WorkspaceRepository::find_role(db, workspace_id, member_id)
            .await?
            .is_some()
        {
            return Err(AppError::FailedPrecondition(
                "user is already a member".to_string(),
            ));
        }

        let member = WorkspaceMember {
            id: ids::new_id(),
            workspace_id,
            user_id: member_id,
            role: input.role,
        };

        let txn = repositories::begin(db).await?;
        WorkspaceRepository::tx(&txn).insert_member(&member).await?;
        repositories::commit(txn).await?;

        Ok(member)
    }

    /// Variables of the global environment, in display order
    pub async fn variables(
        db: &DatabaseConnection,
        user_id: Uuid,
        workspace_id: Uuid,
    ) -> AppResult<Vec<Variable>> {
        AccessService::check_read(db, user_id, workspace_id).await?;
        let workspace = WorkspaceRepository::find_by_id(db, workspace_id).await?;

        match workspace.global_env_id {
            Some(env_id) => EnvironmentRepository::list_variables(db, env_id).await,
            None => Ok(Vec::new()),
        }
    }

    /// Create the variable or replace the one with the same key
    pub async fn upsert_variable(
        db: &DatabaseConnection,
        user_id: Uuid,
        workspace_id: Uuid,
        input: UpsertVariable,
    ) -> AppResult<Variable> {
        let key = input.key.trim().to_string();
        if key.is_empty() {
            return Err(AppError::InvalidArgument("key is required".to_string()));
        }
        AccessService::check_write(db, user_id, workspace_id).await?;

        let workspace = WorkspaceRepository::find_by_id(db, workspace_id).await?;
        let env_id = workspace.global_env_id.ok_or_else(|| {
            AppError::FailedPrecondition("workspace has no global environment".to_string())
        })?;
        let existing = EnvironmentRepository::list_variables(db, env_id)
            .await?
            .into_iter()
            .find(|v| v.key == key);

        let txn = repositories::begin(db).await?;
        let writer = EnvironmentRepository::tx(&txn);
        let variable = match existing {
            Some(mut var) => {
                var.value = input.value;
                if let Some(enabled) = input.enabled {
                    var.enabled = enabled;
                }
                if let Some(description) = input.description {
                    var.description = description;
                }
                if let Some(order) = input.display_order {
                    var.display_order = order;
                }
                writer.update_variable(&var).await?;
                var
            }
            None => {
                let var = Variable {
                    id: ids::new_id(),
                    env_id,
                    key,
                    value: input.value,
                    enabled: input.enabled.unwrap_or(true),
                    description: input.description.unwrap_or_default(),
                    display_order: input.display_order.unwrap_or(0.0),
                };
                writer.insert_variable(&var).await?;
                var
            }
        };
        repositories::commit(txn).await?;

        Ok(variable)
    }
}
