//! Handlers for the four key/value child collections. Each collection gets
//! its own routes and OpenAPI entries; the bodies only differ by kind.

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::handlers::{DeletedResponse, ListResponse};
use crate::middlewares::AuthUser;
use crate::models::{Batch, DeleteItem, KeyValue, KeyValueInsert, KeyValueKind, KeyValueUpdate};
use crate::services::KeyValueService;
use crate::state::AppState;

macro_rules! key_value_handlers {
    (
        kind: $kind:expr,
        path: $path:literal,
        delete_path: $delete_path:literal,
        tag: $tag:literal,
        list: $list:ident,
        insert: $insert:ident,
        update: $update:ident,
        delete: $delete:ident $(,)?
    ) => {
        #[utoipa::path(
            get,
            path = $path,
            responses(
                (status = 200, description = "Rows of every visible request", body = ListResponse<KeyValue>),
                (status = 401, description = "Unauthorized")
            ),
            security(("bearer_auth" = [])),
            tag = $tag
        )]
        pub async fn $list(
            user: AuthUser,
            State(state): State<AppState>,
        ) -> AppResult<Json<ListResponse<KeyValue>>> {
            let rows = KeyValueService::collection(&state.db, user.id, $kind).await?;
            Ok(Json(rows.into()))
        }

        #[utoipa::path(
            post,
            path = $path,
            request_body = Batch<KeyValueInsert>,
            responses(
                (status = 200, description = "Inserted rows", body = ListResponse<KeyValue>),
                (status = 400, description = "Invalid batch or override"),
                (status = 404, description = "Owning request not found"),
                (status = 412, description = "Duplicate id or snapshot owner")
            ),
            security(("bearer_auth" = [])),
            tag = $tag
        )]
        pub async fn $insert(
            user: AuthUser,
            State(state): State<AppState>,
            Json(payload): Json<Batch<KeyValueInsert>>,
        ) -> AppResult<Json<ListResponse<KeyValue>>> {
            let rows = KeyValueService::insert(
                &state.db,
                &state.streams,
                user.id,
                $kind,
                payload.into_items()?,
            )
            .await?;
            Ok(Json(rows.into()))
        }

        #[utoipa::path(
            patch,
            path = $path,
            request_body = Batch<KeyValueUpdate>,
            responses(
                (status = 200, description = "Updated rows", body = ListResponse<KeyValue>),
                (status = 404, description = "Row not found")
            ),
            security(("bearer_auth" = [])),
            tag = $tag
        )]
        pub async fn $update(
            user: AuthUser,
            State(state): State<AppState>,
            Json(payload): Json<Batch<KeyValueUpdate>>,
        ) -> AppResult<Json<ListResponse<KeyValue>>> {
            let rows = KeyValueService::update(
                &state.db,
                &state.streams,
                user.id,
                $kind,
                payload.into_items()?,
            )
            .await?;
            Ok(Json(rows.into()))
        }

        #[utoipa::path(
            post,
            path = $delete_path,
            request_body = Batch<DeleteItem>,
            responses(
                (status = 200, description = "Deleted ids", body = DeletedResponse),
                (status = 412, description = "Row is still overridden by a delta")
            ),
            security(("bearer_auth" = [])),
            tag = $tag
        )]
        pub async fn $delete(
            user: AuthUser,
            State(state): State<AppState>,
            Json(payload): Json<Batch<DeleteItem>>,
        ) -> AppResult<Json<DeletedResponse>> {
            let deleted = KeyValueService::delete(
                &state.db,
                &state.streams,
                user.id,
                $kind,
                payload.into_items()?,
            )
            .await?;
            Ok(Json(DeletedResponse { deleted }))
        }
    };
}

key_value_handlers! {
    kind: KeyValueKind::Header,
    path: "/api/http/headers",
    delete_path: "/api/http/headers/delete",
    tag: "Headers",
    list: list_headers,
    insert: insert_headers,
    update: update_headers,
    delete: delete_headers,
}

key_value_handlers! {
    kind: KeyValueKind::SearchParam,
    path: "/api/http/search-params",
    delete_path: "/api/http/search-params/delete",
    tag: "Search Params",
    list: list_search_params,
    insert: insert_search_params,
    update: update_search_params,
    delete: delete_search_params,
}

key_value_handlers! {
    kind: KeyValueKind::BodyForm,
    path: "/api/http/body-form",
    delete_path: "/api/http/body-form/delete",
    tag: "Form Bodies",
    list: list_body_forms,
    insert: insert_body_forms,
    update: update_body_forms,
    delete: delete_body_forms,
}

key_value_handlers! {
    kind: KeyValueKind::BodyUrlEncoded,
    path: "/api/http/body-urlencoded",
    delete_path: "/api/http/body-urlencoded/delete",
    tag: "Url-encoded Bodies",
    list: list_body_urlencoded,
    insert: insert_body_urlencoded,
    update: update_body_urlencoded,
    delete: delete_body_urlencoded,
}
