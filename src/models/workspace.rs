use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Workspace {
    pub id: Uuid,
    pub name: String,
    pub global_env_id: Option<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Workspace together with the caller's role in it
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WorkspaceWithRole {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub role: Role,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WorkspaceMember {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateWorkspace {
    /// Optional client-chosen id
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AddMember {
    pub user_id: String,
    pub role: Role,
}
