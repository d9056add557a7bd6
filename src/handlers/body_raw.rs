use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::handlers::{DeletedResponse, ListResponse};
use crate::middlewares::AuthUser;
use crate::models::{Batch, BodyRaw, BodyRawInsert, BodyRawUpdate, DeleteItem};
use crate::services::BodyRawService;
use crate::state::AppState;

/// List raw bodies; byte fields are base64
#[utoipa::path(
    get,
    path = "/api/http/body-raw",
    responses(
        (status = 200, description = "Raw bodies", body = ListResponse<BodyRaw>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Raw Bodies"
)]
pub async fn list_body_raw(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<BodyRaw>>> {
    let rows = BodyRawService::collection(&state.db, user.id).await?;
    Ok(Json(rows.into()))
}

#[utoipa::path(
    post,
    path = "/api/http/body-raw",
    request_body = Batch<BodyRawInsert>,
    responses(
        (status = 200, description = "Inserted bodies", body = ListResponse<BodyRaw>),
        (status = 400, description = "Invalid base64 or second body for a request"),
        (status = 412, description = "Request already has a body")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Raw Bodies"
)]
pub async fn insert_body_raw(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<BodyRawInsert>>,
) -> AppResult<Json<ListResponse<BodyRaw>>> {
    let rows =
        BodyRawService::insert(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(rows.into()))
}

#[utoipa::path(
    patch,
    path = "/api/http/body-raw",
    request_body = Batch<BodyRawUpdate>,
    responses(
        (status = 200, description = "Updated bodies", body = ListResponse<BodyRaw>),
        (status = 404, description = "Body not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Raw Bodies"
)]
pub async fn update_body_raw(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<BodyRawUpdate>>,
) -> AppResult<Json<ListResponse<BodyRaw>>> {
    let rows =
        BodyRawService::update(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(rows.into()))
}

#[utoipa::path(
    post,
    path = "/api/http/body-raw/delete",
    request_body = Batch<DeleteItem>,
    responses(
        (status = 200, description = "Deleted ids", body = DeletedResponse)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Raw Bodies"
)]
pub async fn delete_body_raw(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<DeleteItem>>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted =
        BodyRawService::delete(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(DeletedResponse { deleted }))
}
