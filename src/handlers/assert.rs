use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::handlers::{DeletedResponse, ListResponse};
use crate::middlewares::AuthUser;
use crate::models::{Assert, AssertInsert, AssertUpdate, Batch, DeleteItem};
use crate::services::AssertService;
use crate::state::AppState;

/// List assertions of every visible request
#[utoipa::path(
    get,
    path = "/api/http/asserts",
    responses(
        (status = 200, description = "Assertions", body = ListResponse<Assert>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Asserts"
)]
pub async fn list_asserts(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<Assert>>> {
    let rows = AssertService::collection(&state.db, user.id).await?;
    Ok(Json(rows.into()))
}

#[utoipa::path(
    post,
    path = "/api/http/asserts",
    request_body = Batch<AssertInsert>,
    responses(
        (status = 200, description = "Inserted assertions", body = ListResponse<Assert>),
        (status = 400, description = "Invalid batch or override"),
        (status = 412, description = "Duplicate id or snapshot owner")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Asserts"
)]
pub async fn insert_asserts(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<AssertInsert>>,
) -> AppResult<Json<ListResponse<Assert>>> {
    let rows =
        AssertService::insert(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(rows.into()))
}

#[utoipa::path(
    patch,
    path = "/api/http/asserts",
    request_body = Batch<AssertUpdate>,
    responses(
        (status = 200, description = "Updated assertions", body = ListResponse<Assert>),
        (status = 404, description = "Assertion not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Asserts"
)]
pub async fn update_asserts(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<AssertUpdate>>,
) -> AppResult<Json<ListResponse<Assert>>> {
    let rows =
        AssertService::update(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(rows.into()))
}

#[utoipa::path(
    post,
    path = "/api/http/asserts/delete",
    request_body = Batch<DeleteItem>,
    responses(
        (status = 200, description = "Deleted ids", body = DeletedResponse),
        (status = 403, description = "Only owners can delete")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Asserts"
)]
pub async fn delete_asserts(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<DeleteItem>>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted =
        AssertService::delete(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(DeletedResponse { deleted }))
}
