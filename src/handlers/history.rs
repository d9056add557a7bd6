use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::handlers::ListResponse;
use crate::middlewares::AuthUser;
use crate::models::{Response, ResponseAssert, ResponseHeader, Version};
use crate::services::HistoryService;
use crate::state::AppState;

/// Stored responses, newest first. Binary bodies render as a byte count.
#[utoipa::path(
    get,
    path = "/api/http/responses",
    responses(
        (status = 200, description = "Responses", body = ListResponse<Response>),
        (status = 401, description = "Unauthorized")
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "History"
)]
pub async fn list_responses(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<Response>>> {
    Ok(Json(HistoryService::responses(&state.db, user.id).await?.into()))
}

#[utoipa::path(
    get,
    path = "/api/http/response-headers",
    responses(
        (status = 200, description = "Response headers", body = ListResponse<ResponseHeader>)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "History"
)]
pub async fn list_response_headers(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<ResponseHeader>>> {
    Ok(Json(
        HistoryService::response_headers(&state.db, user.id).await?.into(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/http/response-asserts",
    responses(
        (status = 200, description = "Assertion results", body = ListResponse<ResponseAssert>)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "History"
)]
pub async fn list_response_asserts(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<ResponseAssert>>> {
    Ok(Json(
        HistoryService::response_asserts(&state.db, user.id).await?.into(),
    ))
}

#[utoipa::path(
    get,
    path = "/api/http/versions",
    responses(
        (status = 200, description = "Versions, newest first", body = ListResponse<Version>)
    ),
    security(
        ("bearer_auth" = [])
    ),
    tag = "History"
)]
pub async fn list_versions(
    user: AuthUser,
    State(state): State<AppState>,
) -> AppResult<Json<ListResponse<Version>>> {
    Ok(Json(HistoryService::versions(&state.db, user.id).await?.into()))
}
