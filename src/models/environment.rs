use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Environment {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Variable {
    pub id: Uuid,
    pub env_id: Uuid,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,
}

/// Create or replace a variable of the workspace's global environment, matched by key
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct UpsertVariable {
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub display_order: Option<f64>,
}
