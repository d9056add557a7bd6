use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use http_workbench::config::Config;
use http_workbench::entity::{BodyKind, Role};
use http_workbench::handlers::DeletedResponse;
use http_workbench::models::{
    AddMember, Assert, AssertInsert, AssertUpdate, BodyRaw, BodyRawInsert, BodyRawUpdate,
    CreateWorkspace, DeleteItem, Http, HttpInsert, HttpUpdate, KeyValue, KeyValueInsert,
    KeyValueUpdate, LogEntry, LogLevel, Response, ResponseAssert, ResponseHeader, RunOptions,
    UpsertVariable, Variable, Version, WorkspaceMember, WorkspaceWithRole,
};
use http_workbench::services::RunResult;
use http_workbench::state::AppState;
use http_workbench::{build_router, handlers};

/// Security scheme for Bearer token
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::workspace::create_workspace,
        handlers::workspace::list_workspaces,
        handlers::workspace::add_member,
        handlers::workspace::list_variables,
        handlers::workspace::upsert_variable,
        handlers::http::list_http,
        handlers::http::insert_http,
        handlers::http::update_http,
        handlers::http::delete_http,
        handlers::http::duplicate_http,
        handlers::http::run_http,
        handlers::key_value::list_headers,
        handlers::key_value::insert_headers,
        handlers::key_value::update_headers,
        handlers::key_value::delete_headers,
        handlers::key_value::list_search_params,
        handlers::key_value::insert_search_params,
        handlers::key_value::update_search_params,
        handlers::key_value::delete_search_params,
        handlers::key_value::list_body_forms,
        handlers::key_value::insert_body_forms,
        handlers::key_value::update_body_forms,
        handlers::key_value::delete_body_forms,
        handlers::key_value::list_body_urlencoded,
        handlers::key_value::insert_body_urlencoded,
        handlers::key_value::update_body_urlencoded,
        handlers::key_value::delete_body_urlencoded,
        handlers::body_raw::list_body_raw,
        handlers::body_raw::insert_body_raw,
        handlers::body_raw::update_body_raw,
        handlers::body_raw::delete_body_raw,
        handlers::assert::list_asserts,
        handlers::assert::insert_asserts,
        handlers::assert::update_asserts,
        handlers::assert::delete_asserts,
        handlers::history::list_responses,
        handlers::history::list_response_headers,
        handlers::history::list_response_asserts,
        handlers::history::list_versions,
        handlers::sync::sync_http,
        handlers::sync::sync_headers,
        handlers::sync::sync_search_params,
        handlers::sync::sync_body_forms,
        handlers::sync::sync_body_urlencoded,
        handlers::sync::sync_asserts,
        handlers::sync::sync_body_raw,
        handlers::sync::sync_responses,
        handlers::sync::sync_response_headers,
        handlers::sync::sync_response_asserts,
        handlers::sync::sync_versions,
        handlers::sync::sync_base_versions,
        handlers::sync::sync_logs,
    ),
    components(schemas(
        Role,
        BodyKind,
        CreateWorkspace,
        WorkspaceWithRole,
        WorkspaceMember,
        AddMember,
        Variable,
        UpsertVariable,
        Http,
        HttpInsert,
        HttpUpdate,
        RunOptions,
        RunResult,
        KeyValue,
        KeyValueInsert,
        KeyValueUpdate,
        Assert,
        AssertInsert,
        AssertUpdate,
        BodyRaw,
        BodyRawInsert,
        BodyRawUpdate,
        DeleteItem,
        DeletedResponse,
        Response,
        ResponseHeader,
        ResponseAssert,
        Version,
        LogEntry,
        LogLevel,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Workspaces", description = "Workspaces, members and global variables"),
        (name = "Requests", description = "Request templates, deltas and runs"),
        (name = "Headers", description = "Request headers"),
        (name = "Search Params", description = "Query string parameters"),
        (name = "Form Bodies", description = "multipart/form-data fields"),
        (name = "Url-encoded Bodies", description = "application/x-www-form-urlencoded fields"),
        (name = "Raw Bodies", description = "Raw request bodies"),
        (name = "Asserts", description = "Response assertions"),
        (name = "History", description = "Responses, assertion results and versions"),
        (name = "Sync", description = "Server-sent event feeds")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    let addr = config.server_addr();

    // Connect and migrate
    tracing::info!("Connecting to database...");
    let state = AppState::new(config).await?;
    tracing::info!("Database ready");

    let streams = state.streams.clone();
    let app = build_router(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server started on http://{}", addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui/", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
            }
            // Closes open sync feeds so the server can drain
            streams.shutdown();
        })
        .await?;

    Ok(())
}
