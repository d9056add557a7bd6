// Library crate for the request workbench
// Exports modules for use by the server binary and tests

pub mod config;
pub mod entity;
pub mod error;
pub mod events;
pub mod handlers;
pub mod ids;
pub mod middlewares;
pub mod migrator;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::handlers::{
    add_member, create_workspace, delete_asserts, delete_body_forms, delete_body_raw,
    delete_body_urlencoded, delete_headers, delete_http, delete_search_params, duplicate_http,
    insert_asserts, insert_body_forms, insert_body_raw, insert_body_urlencoded, insert_headers,
    insert_http, insert_search_params, list_asserts, list_body_forms, list_body_raw,
    list_body_urlencoded, list_headers, list_http, list_response_asserts, list_response_headers,
    list_responses, list_search_params, list_variables, list_versions, list_workspaces, run_http,
    sync_asserts, sync_base_versions, sync_body_forms, sync_body_raw, sync_body_urlencoded,
    sync_headers, sync_http, sync_logs, sync_response_asserts, sync_response_headers,
    sync_responses, sync_search_params, sync_versions, update_asserts, update_body_forms,
    update_body_raw, update_body_urlencoded, update_headers, update_http, update_search_params,
    upsert_variable,
};
use crate::middlewares::auth_middleware;
use crate::state::AppState;

/// Build the application router with the given state
pub fn build_router(state: AppState) -> Router {
    // Protected routes (require authentication)
    let protected_routes = Router::new()
        // Workspace routes
        .route("/api/workspaces", get(list_workspaces).post(create_workspace))
        .route("/api/workspaces/{id}/members", post(add_member))
        .route(
            "/api/workspaces/{id}/variables",
            get(list_variables).post(upsert_variable),
        )
        // Request routes
        .route(
            "/api/http",
            get(list_http).post(insert_http).patch(update_http),
        )
        .route("/api/http/delete", post(delete_http))
        .route("/api/http/{id}/duplicate", post(duplicate_http))
        .route("/api/http/{id}/run", post(run_http))
        // Key/value children
        .route(
            "/api/http/headers",
            get(list_headers).post(insert_headers).patch(update_headers),
        )
        .route("/api/http/headers/delete", post(delete_headers))
        .route(
            "/api/http/search-params",
            get(list_search_params)
                .post(insert_search_params)
                .patch(update_search_params),
        )
        .route("/api/http/search-params/delete", post(delete_search_params))
        .route(
            "/api/http/body-form",
            get(list_body_forms)
                .post(insert_body_forms)
                .patch(update_body_forms),
        )
        .route("/api/http/body-form/delete", post(delete_body_forms))
        .route(
            "/api/http/body-urlencoded",
            get(list_body_urlencoded)
                .post(insert_body_urlencoded)
                .patch(update_body_urlencoded),
        )
        .route("/api/http/body-urlencoded/delete", post(delete_body_urlencoded))
        // Raw bodies and assertions
        .route(
            "/api/http/body-raw",
            get(list_body_raw).post(insert_body_raw).patch(update_body_raw),
        )
        .route("/api/http/body-raw/delete", post(delete_body_raw))
        .route(
            "/api/http/asserts",
            get(list_asserts).post(insert_asserts).patch(update_asserts),
        )
        .route("/api/http/asserts/delete", post(delete_asserts))
        // Run history
        .route("/api/http/responses", get(list_responses))
        .route("/api/http/response-headers", get(list_response_headers))
        .route("/api/http/response-asserts", get(list_response_asserts))
        .route("/api/http/versions", get(list_versions))
        // Sync feeds
        .route("/api/http/sync", get(sync_http))
        .route("/api/http/headers/sync", get(sync_headers))
        .route("/api/http/search-params/sync", get(sync_search_params))
        .route("/api/http/body-form/sync", get(sync_body_forms))
        .route("/api/http/body-urlencoded/sync", get(sync_body_urlencoded))
        .route("/api/http/body-raw/sync", get(sync_body_raw))
        .route("/api/http/asserts/sync", get(sync_asserts))
        .route("/api/http/responses/sync", get(sync_responses))
        .route("/api/http/response-headers/sync", get(sync_response_headers))
        .route("/api/http/response-asserts/sync", get(sync_response_asserts))
        .route("/api/http/versions/sync", get(sync_versions))
        .route("/api/http/base-versions/sync", get(sync_base_versions))
        .route("/api/logs/sync", get(sync_logs))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/", get(|| async { "Hello, request workbench!" }))
        // Protected routes
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
