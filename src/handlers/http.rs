use axum::{
    extract::{Path, State},
    Json,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::{DeletedResponse, ListResponse};
use crate::middlewares::AuthUser;
use crate::models::{Batch, DeleteItem, Http, HttpInsert, HttpUpdate, RunOptions};
use crate::services::{HttpService, RunEngine, RunResult};
use crate::state::AppState;

/// List base and delta requests of the caller's workspaces
#[utoipa::path(
    get,
    path = "/api/http",
    responses(
        (status = 200, description = "Requests, snapshots excluded", body = ListResponse<Http>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn list_http(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<Http>>> {
    let rows = HttpService::collection(&state.db, user.id).await?;
    Ok(Json(rows.into()))
}

/// Insert requests with client-chosen ids
#[utoipa::path(
    post,
    path = "/api/http",
    request_body = Batch<HttpInsert>,
    responses(
        (status = 200, description = "Inserted requests", body = ListResponse<Http>),
        (status = 400, description = "Invalid batch or delta parent"),
        (status = 403, description = "Role cannot write"),
        (status = 404, description = "Workspace not found"),
        (status = 412, description = "Duplicate id")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn insert_http(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<HttpInsert>>,
) -> AppResult<Json<ListResponse<Http>>> {
    let rows = HttpService::insert(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(rows.into()))
}

/// Patch requests; absent fields are left unchanged
#[utoipa::path(
    patch,
    path = "/api/http",
    request_body = Batch<HttpUpdate>,
    responses(
        (status = 200, description = "Updated requests", body = ListResponse<Http>),
        (status = 400, description = "Invalid batch"),
        (status = 404, description = "Request not found"),
        (status = 412, description = "Snapshots are read-only")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn update_http(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<HttpUpdate>>,
) -> AppResult<Json<ListResponse<Http>>> {
    let rows = HttpService::update(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(rows.into()))
}

/// Delete requests together with their children, responses and versions
#[utoipa::path(
    post,
    path = "/api/http/delete",
    request_body = Batch<DeleteItem>,
    responses(
        (status = 200, description = "Deleted ids", body = DeletedResponse),
        (status = 403, description = "Only owners can delete"),
        (status = 412, description = "Request still has deltas")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn delete_http(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<Batch<DeleteItem>>,
) -> AppResult<Json<DeletedResponse>> {
    let deleted =
        HttpService::delete(&state.db, &state.streams, user.id, payload.into_items()?).await?;
    Ok(Json(DeletedResponse { deleted }))
}

/// Copy a request and its children; a delta is copied as a resolved base
#[utoipa::path(
    post,
    path = "/api/http/{id}/duplicate",
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    responses(
        (status = 200, description = "The copy", body = Http),
        (status = 404, description = "Request not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn duplicate_http(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<Http>> {
    let http = HttpService::duplicate(&state.db, &state.streams, user.id, id).await?;
    Ok(Json(http))
}

/// Execute a request, store its response and assertion results, and
/// record a version
#[utoipa::path(
    post,
    path = "/api/http/{id}/run",
    params(
        ("id" = Uuid, Path, description = "Request ID")
    ),
    request_body(content = Option<RunOptions>, description = "Optional version naming"),
    responses(
        (status = 200, description = "Run output", body = RunResult),
        (status = 400, description = "Unresolvable URL or undefined variable"),
        (status = 404, description = "Request not found"),
        (status = 412, description = "Snapshots cannot be run"),
        (status = 503, description = "Target unreachable"),
        (status = 504, description = "Target timed out")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Requests"
)]
pub async fn run_http(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<RunOptions>>,
) -> AppResult<Json<RunResult>> {
    let options = payload.map(|Json(options)| options).unwrap_or_default();

    // The outbound call is abandoned if the client goes away
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();

    let result = RunEngine::new(&state)
        .run(user.id, id, options, cancel)
        .await?;
    Ok(Json(result))
}
