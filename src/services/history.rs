use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::error::AppResult;
use crate::models::{Response, ResponseAssert, ResponseHeader, Version};
use crate::repositories::{ResponseRepository, VersionRepository};
use crate::services::http::visible_http_ids;

/// Read side of run output. Responses, their headers and assertion results
/// and versions are append-only, so there is nothing to write here.
pub struct HistoryService;

impl HistoryService {
    pub async fn responses(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<Response>> {
        let http_ids = visible_http_ids(db, user_id).await?;
        ResponseRepository::list_by_https(db, &http_ids).await
    }

    pub async fn response_headers(
        db: &DatabaseConnection,
        user_id: Uuid,
    ) -> AppResult<Vec<ResponseHeader>> {
        let response_ids = Self::response_ids(db, user_id).await?;
        ResponseRepository::list_headers(db, &response_ids).await
    }

    pub async fn response_asserts(
        db: &DatabaseConnection,
        user_id: Uuid,
    ) -> AppResult<Vec<ResponseAssert>> {
        let response_ids = Self::response_ids(db, user_id).await?;
        ResponseRepository::list_asserts(db, &response_ids).await
    }

    pub async fn versions(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<Version>> {
        let http_ids = visible_http_ids(db, user_id).await?;
        VersionRepository::list_by_https(db, &http_ids).await
    }

    async fn response_ids(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<Uuid>> {
        Ok(Self::responses(db, user_id)
            .await?
            .into_iter()
            .map(|r| r.id)
            .collect())
    }
}
