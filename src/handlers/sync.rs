//! Server-Sent Events feeds. A client bootstraps from the collection route
//! and then follows the matching feed; only events from workspaces the
//! caller belongs to are delivered.

use std::convert::Infallible;
use std::time::Duration;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use serde::Serialize;
use tokio_stream::{Stream, StreamExt};
use uuid::Uuid;

use crate::error::AppResult;
use crate::events::{EventStream, Subscription, Topic};
use crate::middlewares::AuthUser;
use crate::services::AccessService;
use crate::state::AppState;

const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Subscribe `user_id` to `stream`, filtered by current membership
fn subscribe<T>(state: &AppState, user_id: Uuid, stream: &EventStream<T>) -> AppResult<Subscription<T>>
where
    T: Clone + Send + Sync + 'static,
{
    let db = state.db.clone();
    let subscription = stream.subscribe(move |topic: Topic| {
        let db = db.clone();
        async move { AccessService::is_member(&db, user_id, topic.workspace_id).await }
    })?;

    tracing::info!(%user_id, stream = stream.name(), "sync client connected");
    Ok(subscription)
}

fn into_sse<T>(
    name: &'static str,
    subscription: Subscription<T>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>>
where
    T: Serialize + Send + 'static,
{
    let events = subscription.filter_map(move |event| {
        match Event::default().event(name).json_data(&event) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(stream = name, error = %e, "dropping unserializable event");
                None
            }
        }
    });

    Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(KEEP_ALIVE_INTERVAL)
            .text("keep-alive"),
    )
}

macro_rules! sync_handler {
    ($name:ident, $field:ident, $path:literal, $tag:literal) => {
        #[utoipa::path(
            get,
            path = $path,
            responses(
                (status = 200, description = "Event stream of `SyncEvent` JSON payloads", content_type = "text/event-stream"),
                (status = 401, description = "Unauthorized")
            ),
            security(("bearer_auth" = [])),
            tag = $tag
        )]
        pub async fn $name(
            user: AuthUser,
            State(state): State<AppState>,
        ) -> AppResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
            let stream = &state.streams.$field;
            let subscription = subscribe(&state, user.id, stream)?;
            Ok(into_sse(stream.name(), subscription))
        }
    };
}

sync_handler!(sync_http, http, "/api/http/sync", "Sync");
sync_handler!(sync_headers, header, "/api/http/headers/sync", "Sync");
sync_handler!(sync_search_params, search_param, "/api/http/search-params/sync", "Sync");
sync_handler!(sync_body_forms, body_form, "/api/http/body-form/sync", "Sync");
sync_handler!(sync_body_urlencoded, body_urlencoded, "/api/http/body-urlencoded/sync", "Sync");
sync_handler!(sync_asserts, assert, "/api/http/asserts/sync", "Sync");
sync_handler!(sync_body_raw, body_raw, "/api/http/body-raw/sync", "Sync");
sync_handler!(sync_responses, response, "/api/http/responses/sync", "Sync");
sync_handler!(sync_response_headers, response_header, "/api/http/response-headers/sync", "Sync");
sync_handler!(sync_response_asserts, response_assert, "/api/http/response-asserts/sync", "Sync");
sync_handler!(sync_versions, version, "/api/http/versions/sync", "Sync");
sync_handler!(sync_base_versions, base_request_version, "/api/http/base-versions/sync", "Sync");
sync_handler!(sync_logs, log, "/api/logs/sync", "Sync");
