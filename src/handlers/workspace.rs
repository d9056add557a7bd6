use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::handlers::ListResponse;
use crate::middlewares::AuthUser;
use crate::models::{
    AddMember, CreateWorkspace, UpsertVariable, Variable, WorkspaceMember, WorkspaceWithRole,
};
use crate::services::WorkspaceService;
use crate::state::AppState;

/// Create a workspace owned by the caller
#[utoipa::path(
    post,
    path = "/api/workspaces",
    request_body = CreateWorkspace,
    responses(
        (status = 201, description = "Workspace created", body = WorkspaceWithRole),
        (status = 400, description = "Validation error"),
        (status = 412, description = "Workspace id already taken")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Workspaces"
)]
pub async fn create_workspace(
    user: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateWorkspace>,
) -> AppResult<(StatusCode, Json<WorkspaceWithRole>)> {
    let workspace = WorkspaceService::create(&state.db, user.id, payload).await?;
    Ok((StatusCode::CREATED, Json(workspace)))
}

/// List the caller's workspaces
#[utoipa::path(
    get,
    path = "/api/workspaces",
    responses(
        (status = 200, description = "Workspaces with the caller's role", body = ListResponse<WorkspaceWithRole>)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Workspaces"
)]
pub async fn list_workspaces(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<WorkspaceWithRole>>> {
    let workspaces = WorkspaceService::list(&state.db, user.id).await?;
    Ok(Json(workspaces.into()))
}

#[utoipa::path(
    post,
    path = "/api/workspaces/{id}/members",
    params(
        ("id" = Uuid, Path, description = "Workspace ID")
    ),
    request_body = AddMember,
    responses(
        (status = 201, description = "Member added", body = WorkspaceMember),
        (status = 403, description = "Role cannot add members"),
        (status = 404, description = "Workspace or user not found"),
        (status = 412, description = "Already a member")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Workspaces"
)]
pub async fn add_member(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddMember>,
) -> AppResult<(StatusCode, Json<WorkspaceMember>)> {
    let member = WorkspaceService::add_member(&state.db, user.id, id, payload).await?;
    Ok((StatusCode::CREATED, Json(member)))
}

/// Variables of the workspace's global environment
#[utoipa::path(
    get,
    path = "/api/workspaces/{id}/variables",
    params(
        ("id" = Uuid, Path, description = "Workspace ID")
    ),
    responses(
        (status = 200, description = "Variables", body = ListResponse<Variable>),
        (status = 404, description = "Workspace not found")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Workspaces"
)]
pub async fn list_variables(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ListResponse<Variable>>> {
    let variables = WorkspaceService::variables(&state.db, user.id, id).await?;
    Ok(Json(variables.into()))
}

/// Set a variable by key, creating it when absent
#[utoipa::path(
    post,
    path = "/api/workspaces/{id}/variables",
    params(
        ("id" = Uuid, Path, description = "Workspace ID")
    ),
    request_body = UpsertVariable,
    responses(
        (status = 200, description = "Stored variable", body = Variable),
        (status = 403, description = "Role cannot write")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "Workspaces"
)]
pub async fn upsert_variable(
    user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpsertVariable>,
) -> AppResult<Json<Variable>> {
    let variable = WorkspaceService::upsert_variable(&state.db, user.id, id, payload).await?;
    Ok(Json(variable))
}
