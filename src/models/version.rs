use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Immutable record of one run. `id` is also the id of the snapshot request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Version {
    pub id: Uuid,
    pub http_id: Uuid,
    pub author_user_id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: i64,
}
