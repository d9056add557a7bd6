use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

/// Envelope of every collection and batch response
#[derive(Debug, Serialize, ToSchema)]
pub struct ListResponse<T> {
    pub data: Vec<T>,
}

impl<T> From<Vec<T>> for ListResponse<T> {
    fn from(data: Vec<T>) -> Self {
        Self { data }
    }
}

/// Ids removed by a batch delete
#[derive(Debug, Serialize, ToSchema)]
pub struct DeletedResponse {
    pub deleted: Vec<Uuid>,
}
