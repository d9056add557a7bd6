use std::collections::{HashMap, HashSet};

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::entity::BodyKind;
use crate::error::{AppError, AppResult};
use crate::events::{EventStreams, SyncEvent, Topic};
use crate::ids;
use crate::models::{DeleteItem, Http, HttpInsert, HttpUpdate, KeyValueKind, Version};
use crate::repositories::{
    self, AssertRepository, BodyRawRepository, HttpRepository, KeyValueRepository, Repository,
    ResponseRepository, VersionRepository, WorkspaceRepository,
};
use crate::services::access::{AccessService, Gate};
use crate::services::resolver::ResolverService;

/// Load the requests that own a set of rows and apply `gate` to their
/// workspaces. Snapshots are frozen, so writes against them are refused.
pub(crate) async fn owning_requests(
    db: &DatabaseConnection,
    user_id: Uuid,
    http_ids: &[Uuid],
    gate: Gate,
) -> AppResult<HashMap<Uuid, Http>> {
    let unique: Vec<Uuid> = http_ids
        .iter()
        .copied()
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    let owners: HashMap<Uuid, Http> = HttpRepository::find_many(db, &unique)
        .await?
        .into_iter()
        .map(|h| (h.id, h))
        .collect();

    if owners.len() != unique.len() {
        return Err(AppError::NotFound("Http".to_string()));
    }

    AccessService::check_all(db, user_id, owners.values().map(|h| h.workspace_id).collect::<Vec<Uuid>>(), gate).await?;

    if owners.values().any(|h| h.is_snapshot) {
        return Err(AppError::FailedPrecondition(
            "versioned snapshots are read-only".to_string(),
        ));
    }

    Ok(owners)
}

/// Every request id visible to the user, snapshots included
pub(crate) async fn visible_http_ids(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<Uuid>> {
    let workspace_ids = WorkspaceRepository::workspace_ids_for_user(db, user_id).await?;
    HttpRepository::ids_by_workspaces(db, &workspace_ids).await
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Request CRUD
pub struct HttpService;

impl HttpService {
    /// Requests of every workspace the user belongs to, snapshots excluded
    pub async fn collection(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<Http>> {
        let workspace_ids = WorkspaceRepository::workspace_ids_for_user(db, user_id).await?;
        HttpRepository::list_by_workspaces(db, &workspace_ids).await
    }

    pub async fn insert(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        items: Vec<HttpInsert>,
    ) -> AppResult<Vec<Http>> {
        let now = ids::now_unix();
        let mut rows = Vec::with_capacity(items.len());
        let mut parent_ids = Vec::new();

        for item in &items {
            let id = ids::parse_id(&item.id, "id")?;
            let workspace_id = ids::parse_id(&item.workspace_id, "workspace_id")?;
            let parent_http_id = ids::parse_optional_id(item.parent_http_id.as_deref(), "parent_http_id")?;
            if let Some(parent_id) = parent_http_id {
                parent_ids.push(parent_id);
            }

            let is_delta = parent_http_id.is_some();
            rows.push(Http {
                id,
                workspace_id,
                name: item.name.clone(),
                url: item.url.clone(),
                method: if item.method.trim().is_empty() {
                    "GET".to_string()
                } else {
                    item.method.trim().to_ascii_uppercase()
                },
                description: item.description.clone(),
                body_kind: item.body_kind,
                display_order: item.display_order.unwrap_or(0.0),
                last_run_at: None,
                parent_http_id,
                is_delta,
                delta_name: if is_delta { item.delta_name.clone() } else { None },
                delta_url: if is_delta { item.delta_url.clone() } else { None },
                delta_method: if is_delta {
                    non_empty(item.delta_method.clone()).map(|m| m.to_ascii_uppercase())
                } else {
                    None
                },
                delta_description: if is_delta { item.delta_description.clone() } else { None },
                delta_body_kind: if is_delta { item.delta_body_kind } else { None },
                is_snapshot: false,
                created_at: now,
                updated_at: now,
            });
        }

        AccessService::check_all(db, user_id, rows.iter().map(|r| r.workspace_id).collect::<Vec<Uuid>>(), Gate::Write).await?;

        // Deltas derive from an existing base of the same workspace
        let parents: HashMap<Uuid, Http> = HttpRepository::find_many(db, &parent_ids)
            .await?
            .into_iter()
            .map(|h| (h.id, h))
            .collect();
        for row in rows.iter().filter(|r| r.is_delta) {
            let parent = row
                .parent_http_id
                .and_then(|id| parents.get(&id))
                .ok_or_else(|| AppError::InvalidArgument("parent request does not exist".to_string()))?;
            if !parent.is_base() {
                return Err(AppError::InvalidArgument(
                    "parent request must be a base request".to_string(),
                ));
            }
            if parent.workspace_id != row.workspace_id {
                return Err(AppError::InvalidArgument(
                    "delta must live in its parent's workspace".to_string(),
                ));
            }
        }

        let txn = repositories::begin(db).await?;
        HttpRepository::tx(&txn).insert_many(&rows).await?;
        repositories::commit(txn).await?;

        for row in &rows {
            streams
                .http
                .publish(Topic::workspace(row.workspace_id), SyncEvent::insert(row.clone()));
        }

        tracing::info!(count = rows.len(), %user_id, "requests inserted");
        Ok(rows)
    }

    pub async fn update(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        items: Vec<HttpUpdate>,
    ) -> AppResult<Vec<Http>> {
        let ids: Vec<Uuid> = items
            .iter()
            .map(|item| ids::parse_id(&item.id, "id"))
            .collect::<AppResult<_>>()?;
        let mut owners = owning_requests(db, user_id, &ids, Gate::Write).await?;

        let now = ids::now_unix();
        let mut rows = Vec::with_capacity(items.len());
        for (id, patch) in ids.iter().zip(items) {
            let mut row = owners
                .remove(id)
                .ok_or_else(|| AppError::InvalidArgument("duplicate id in batch".to_string()))?;
            apply_patch(&mut row, patch)?;
            row.updated_at = now;
            rows.push(row);
        }

        let txn = repositories::begin(db).await?;
        let writer = HttpRepository::tx(&txn);
        for row in &rows {
            writer.update(row).await?;
        }
        repositories::commit(txn).await?;

        // A run may have committed since the rows were read
        let last_runs: HashMap<Uuid, Option<i64>> = HttpRepository::find_many(db, &ids)
            .await?
            .into_iter()
            .map(|h| (h.id, h.last_run_at))
            .collect();
        for row in rows.iter_mut() {
            if let Some(last_run_at) = last_runs.get(&row.id) {
                row.last_run_at = *last_run_at;
            }
        }

        for row in &rows {
            streams
                .http
                .publish(Topic::workspace(row.workspace_id), SyncEvent::update(row.clone()));
        }

        Ok(rows)
    }

    /// Delete requests together with the snapshots of their versions
    pub async fn delete(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        items: Vec<DeleteItem>,
    ) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = items
            .iter()
            .map(|item| ids::parse_id(&item.id, "id"))
            .collect::<AppResult<_>>()?;
        let owners = owning_requests(db, user_id, &ids, Gate::Delete).await?;

        let versions = VersionRepository::list_by_https(db, &ids).await?;
        let snapshot_ids: Vec<Uuid> = versions.iter().map(|v| v.id).collect();
        let cascade = Cascade::collect(db, &owners, &versions).await?;
        let (delta_ids, base_ids): (Vec<Uuid>, Vec<Uuid>) =
            owners.keys().copied().partition(|id| owners[id].is_delta);

        let txn = repositories::begin(db).await?;
        let writer = HttpRepository::tx(&txn);
        writer.delete_many(&snapshot_ids).await?;
        writer.delete_many(&delta_ids).await?;
        writer.delete_many(&base_ids).await?;
        repositories::commit(txn).await?;

        for id in &ids {
            if let Some(http) = owners.get(id) {
                streams
                    .http
                    .publish(Topic::workspace(http.workspace_id), SyncEvent::delete(*id));
            }
        }
        cascade.publish(streams);

        tracing::info!(count = ids.len(), snapshots = snapshot_ids.len(), "requests deleted");
        Ok(ids)
    }

    /// Copy a request and its children under fresh ids. A delta is copied in
    /// its resolved form and the copy is an independent base.
    pub async fn duplicate(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        id: Uuid,
    ) -> AppResult<Http> {
        let source = HttpRepository::find_by_id(db, id).await?;
        AccessService::check_write(db, user_id, source.workspace_id).await?;

        let resolved = ResolverService::resolve(db, &source).await?;
        let now = ids::now_unix();
        let new_id = ids::new_id();

        let mut http = resolved.http.clone();
        http.id = new_id;
        http.workspace_id = source.workspace_id;
        http.name = format!("Copy of {}", resolved.http.name);
        http.clear_delta();
        http.is_snapshot = false;
        http.last_run_at = None;
        http.created_at = now;
        http.updated_at = now;

        let key_values: Vec<_> = KeyValueKind::ALL
            .into_iter()
            .map(|kind| {
                let rows: Vec<_> = resolved
                    .key_values(kind)
                    .iter()
                    .map(|row| row.detached(ids::new_id(), new_id))
                    .collect();
                (kind, rows)
            })
            .collect();
        let asserts: Vec<_> = resolved
            .asserts
            .iter()
            .map(|row| row.detached(ids::new_id(), new_id))
            .collect();
        let body_raw = resolved.body_raw.map(|mut body| {
            body.id = ids::new_id();
            body.http_id = new_id;
            body.is_delta = false;
            body.delta_raw_data = None;
            body.created_at = now;
            body.updated_at = now;
            body
        });

        let txn = repositories::begin(db).await?;
        HttpRepository::tx(&txn).insert_many(std::slice::from_ref(&http)).await?;
        let kv_writer = KeyValueRepository::tx(&txn);
        for (kind, rows) in &key_values {
            kv_writer.insert_many(*kind, rows).await?;
        }
        AssertRepository::tx(&txn).insert_many(&asserts).await?;
        if let Some(body) = &body_raw {
            BodyRawRepository::tx(&txn)
                .insert_many(std::slice::from_ref(body))
                .await?;
        }
        repositories::commit(txn).await?;

        let topic = Topic::workspace(http.workspace_id);
        streams.http.publish(topic, SyncEvent::insert(http.clone()));
        for (kind, rows) in key_values {
            streams
                .key_value(kind)
                .publish_all(topic, rows.into_iter().map(SyncEvent::insert));
        }
        streams
            .assert
            .publish_all(topic, asserts.into_iter().map(SyncEvent::insert));
        if let Some(body) = body_raw {
            streams.body_raw.publish(topic, SyncEvent::insert(body));
        }

        tracing::info!(source_id = %id, http_id = %new_id, "request duplicated");
        Ok(http)
    }
}

/// Rows that a request delete removes through foreign keys, tagged with
/// the topic their Delete events go out on
#[derive(Default)]
struct Cascade {
    key_values: Vec<(KeyValueKind, Topic, Uuid)>,
    asserts: Vec<(Topic, Uuid)>,
    body_raws: Vec<(Topic, Uuid)>,
    responses: Vec<(Topic, Uuid)>,
    response_headers: Vec<(Topic, Uuid)>,
    response_asserts: Vec<(Topic, Uuid)>,
    versions: Vec<(Topic, Uuid)>,
    base_versions: Vec<(Topic, Uuid)>,
}

impl Cascade {
    /// Must run before the delete commits
    async fn collect(
        db: &DatabaseConnection,
        owners: &HashMap<Uuid, Http>,
        versions: &[Version],
    ) -> AppResult<Self> {
        // Snapshots go with the request they were taken from
        let mut topics: HashMap<Uuid, Topic> = owners
            .values()
            .map(|h| (h.id, Topic::workspace(h.workspace_id)))
            .collect();
        for version in versions {
            if let Some(topic) = topics.get(&version.http_id).copied() {
                topics.insert(version.id, topic);
            }
        }
        let http_ids: Vec<Uuid> = topics.keys().copied().collect();
        let tagged = |http_id: Uuid, id: Uuid| topics.get(&http_id).map(|topic| (*topic, id));

        let mut cascade = Cascade::default();
        for kind in KeyValueKind::ALL {
            for row in KeyValueRepository::list_by_https(db, kind, &http_ids).await? {
                if let Some((topic, id)) = tagged(row.http_id, row.id) {
                    cascade.key_values.push((kind, topic, id));
                }
            }
        }
        cascade.asserts = AssertRepository::list_by_https(db, &http_ids)
            .await?
            .into_iter()
            .filter_map(|a| tagged(a.http_id, a.id))
            .collect();
        cascade.body_raws = BodyRawRepository::list_by_https(db, &http_ids)
            .await?
            .into_iter()
            .filter_map(|b| tagged(b.http_id, b.id))
            .collect();

        let responses = ResponseRepository::list_by_https(db, &http_ids).await?;
        let response_topics: HashMap<Uuid, Topic> = responses
            .iter()
            .filter_map(|r| tagged(r.http_id, r.id).map(|(topic, id)| (id, topic)))
            .collect();
        let response_ids: Vec<Uuid> = response_topics.keys().copied().collect();
        cascade.responses = response_topics.iter().map(|(id, topic)| (*topic, *id)).collect();
        cascade.response_headers = ResponseRepository::list_headers(db, &response_ids)
            .await?
            .into_iter()
            .filter_map(|h| response_topics.get(&h.response_id).map(|topic| (*topic, h.id)))
            .collect();
        cascade.response_asserts = ResponseRepository::list_asserts(db, &response_ids)
            .await?
            .into_iter()
            .filter_map(|a| response_topics.get(&a.response_id).map(|topic| (*topic, a.id)))
            .collect();

        for version in versions {
            let Some((topic, id)) = tagged(version.http_id, version.id) else {
                continue;
            };
            cascade.versions.push((topic, id));
            if owners.get(&version.http_id).is_some_and(|h| h.is_delta) {
                cascade.base_versions.push((topic, id));
            }
        }

        Ok(cascade)
    }

    fn publish(self, streams: &EventStreams) {
        for (kind, topic, id) in self.key_values {
            streams.key_value(kind).publish(topic, SyncEvent::delete(id));
        }
        for (topic, id) in self.asserts {
            streams.assert.publish(topic, SyncEvent::delete(id));
        }
        for (topic, id) in self.body_raws {
            streams.body_raw.publish(topic, SyncEvent::delete(id));
        }
        for (topic, id) in self.response_headers {
            streams.response_header.publish(topic, SyncEvent::delete(id));
        }
        for (topic, id) in self.response_asserts {
            streams.response_assert.publish(topic, SyncEvent::delete(id));
        }
        for (topic, id) in self.responses {
            streams.response.publish(topic, SyncEvent::delete(id));
        }
        for (topic, id) in self.versions {
            streams.version.publish(topic, SyncEvent::delete(id));
        }
        for (topic, id) in self.base_versions {
            streams.base_request_version.publish(topic, SyncEvent::delete(id));
        }
    }
}

fn apply_patch(row: &mut Http, patch: HttpUpdate) -> AppResult<()> {
    let touches_delta = patch.delta_name.is_some()
        || patch.delta_url.is_some()
        || patch.delta_method.is_some()
        || patch.delta_description.is_some()
        || patch.delta_body_kind.is_some();
    if touches_delta && !row.is_delta {
        return Err(AppError::InvalidArgument(
            "delta fields can only be set on a delta request".to_string(),
        ));
    }

    if let Some(name) = patch.name {
        row.name = name;
    }
    if let Some(url) = patch.url {
        row.url = url;
    }
    if let Some(method) = patch.method {
        row.method = method.trim().to_ascii_uppercase();
    }
    if let Some(description) = patch.description {
        row.description = description;
    }
    if let Some(kind) = patch.body_kind {
        row.body_kind = kind;
    }
    if let Some(order) = patch.display_order {
        row.display_order = order;
    }
    if let Some(name) = patch.delta_name {
        row.delta_name = Some(name);
    }
    if let Some(url) = patch.delta_url {
        row.delta_url = Some(url);
    }
    if let Some(method) = patch.delta_method {
        row.delta_method = non_empty(Some(method.trim().to_ascii_uppercase()));
    }
    if let Some(description) = patch.delta_description {
        row.delta_description = Some(description);
    }
    if let Some(kind) = patch.delta_body_kind {
        row.delta_body_kind = match kind {
            BodyKind::Unspecified => None,
            other => Some(other),
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Http {
        Http {
            id: Uuid::now_v7(),
            workspace_id: Uuid::now_v7(),
            name: "List".to_string(),
            url: "https://example.com".to_string(),
            method: "GET".to_string(),
            description: String::new(),
            body_kind: BodyKind::Empty,
            display_order: 0.0,
            last_run_at: None,
            parent_http_id: None,
            is_delta: false,
            delta_name: None,
            delta_url: None,
            delta_method: None,
            delta_description: None,
            delta_body_kind: None,
            is_snapshot: false,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn test_patch_keeps_omitted_fields() {
        let mut row = base();
        apply_patch(
            &mut row,
            HttpUpdate {
                url: Some("https://example.com/v2".to_string()),
                method: Some("post".to_string()),
                ..Default::default()
            },
        )
        .unwrap();

        assert_eq!(row.name, "List");
        assert_eq!(row.url, "https://example.com/v2");
        assert_eq!(row.method, "POST");
    }

    #[test]
    fn test_delta_fields_rejected_on_base() {
        let mut row = base();
        let err = apply_patch(
            &mut row,
            HttpUpdate {
                delta_url: Some("https://staging.example.com".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), crate::error::ErrorCode::InvalidArgument);
    }
}
