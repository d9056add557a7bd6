use std::collections::HashMap;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{EventStreams, SyncEvent, Topic};
use crate::ids;
use crate::models::{DeleteItem, Http, KeyValue, KeyValueInsert, KeyValueKind, KeyValueUpdate};
use crate::repositories::{self, KeyValueRepository};
use crate::services::access::Gate;
use crate::services::http::{owning_requests, visible_http_ids};

/// CRUD for the header, search param, form and url-encoded collections
pub struct KeyValueService;

impl KeyValueService {
    pub async fn collection(
        db: &DatabaseConnection,
        user_id: Uuid,
        kind: KeyValueKind,
    ) -> AppResult<Vec<KeyValue>> {
        let http_ids = visible_http_ids(db, user_id).await?;
        KeyValueRepository::list_by_https(db, kind, &http_ids).await
    }

    pub async fn insert(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        kind: KeyValueKind,
        items: Vec<KeyValueInsert>,
    ) -> AppResult<Vec<KeyValue>> {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            rows.push(KeyValue {
                id: ids::parse_id(&item.id, "id")?,
                http_id: ids::parse_id(&item.http_id, "http_id")?,
                key: item.key,
                value: item.value,
                enabled: item.enabled.unwrap_or(true),
                description: item.description.unwrap_or_default(),
                display_order: item.display_order.unwrap_or(0.0),
                is_delta: item.parent_id.is_some(),
                parent_id: ids::parse_optional_id(item.parent_id.as_deref(), "parent_id")?,
                delta_key: item.delta_key,
                delta_value: item.delta_value,
                delta_enabled: item.delta_enabled,
                delta_description: item.delta_description,
                delta_display_order: item.delta_display_order,
            });
        }

        let http_ids: Vec<Uuid> = rows.iter().map(|r| r.http_id).collect();
        let owners = owning_requests(db, user_id, &http_ids, Gate::Write).await?;
        validate_overrides(db, kind, &rows, &owners).await?;

        let txn = repositories::begin(db).await?;
        KeyValueRepository::tx(&txn).insert_many(kind, &rows).await?;
        repositories::commit(txn).await?;

        publish(streams, kind, &owners, rows.iter().cloned().map(SyncEvent::insert), &rows);
        Ok(rows)
    }

    pub async fn update(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        kind: KeyValueKind,
        items: Vec<KeyValueUpdate>,
    ) -> AppResult<Vec<KeyValue>> {
        let ids: Vec<Uuid> = items
            .iter()
            .map(|item| ids::parse_id(&item.id, "id"))
            .collect::<AppResult<_>>()?;
        let mut existing: HashMap<Uuid, KeyValue> = KeyValueRepository::find_many(db, kind, &ids)
            .await?
            .into_iter()
            .map(|row| (row.id, row))
            .collect();
        if ids.iter().any(|id| !existing.contains_key(id)) {
            return Err(AppError::NotFound(kind.resource().to_string()));
        }

        let http_ids: Vec<Uuid> = existing.values().map(|r| r.http_id).collect();
        let owners = owning_requests(db, user_id, &http_ids, Gate::Write).await?;

        let mut rows = Vec::with_capacity(items.len());
        for (id, patch) in ids.iter().zip(items) {
            let mut row = existing
                .remove(id)
                .ok_or_else(|| AppError::InvalidArgument("duplicate id in batch".to_string()))?;
            apply_patch(&mut row, patch)?;
            rows.push(row);
        }

        let txn = repositories::begin(db).await?;
        let writer = KeyValueRepository::tx(&txn);
        for row in &rows {
            writer.update(kind, row).await?;
        }
        repositories::commit(txn).await?;

        publish(streams, kind, &owners, rows.iter().cloned().map(SyncEvent::update), &rows);
        Ok(rows)
    }

    pub async fn delete(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        kind: KeyValueKind,
        items: Vec<DeleteItem>,
    ) -> AppResult<Vec<Uuid>> {
        let ids: Vec<Uuid> = items
            .iter()
            .map(|item| ids::parse_id(&item.id, "id"))
            .collect::<AppResult<_>>()?;
        let rows = KeyValueRepository::find_many(db, kind, &ids).await?;
        if rows.len() != ids.len() {
            return Err(AppError::NotFound(kind.resource().to_string()));
        }

        let http_ids: Vec<Uuid> = rows.iter().map(|r| r.http_id).collect();
        let owners = owning_requests(db, user_id, &http_ids, Gate::Delete).await?;

        let txn = repositories::begin(db).await?;
        KeyValueRepository::tx(&txn).delete_many(kind, &ids).await?;
        repositories::commit(txn).await?;

        publish(
            streams,
            kind,
            &owners,
            rows.iter().map(|r| SyncEvent::delete(r.id)),
            &rows,
        );
        Ok(ids)
    }
}

/// Overrides must sit on a delta and point at a row of the delta's parent
async fn validate_overrides(
    db: &DatabaseConnection,
    kind: KeyValueKind,
    rows: &[KeyValue],
    owners: &HashMap<Uuid, Http>,
) -> AppResult<()> {
    let parent_ids: Vec<Uuid> = rows.iter().filter_map(|r| r.parent_id).collect();
    if parent_ids.is_empty() {
        return Ok(());
    }

    let parents: HashMap<Uuid, KeyValue> = KeyValueRepository::find_many(db, kind, &parent_ids)
        .await?
        .into_iter()
        .map(|r| (r.id, r))
        .collect();

    for row in rows {
        let Some(parent_id) = row.parent_id else {
            continue;
        };
        let owner = &owners[&row.http_id];
        if !owner.is_delta {
            return Err(AppError::InvalidArgument(
                "overrides require a delta request".to_string(),
            ));
        }
        match parents.get(&parent_id) {
            Some(parent) if Some(parent.http_id) == owner.parent_http_id => {}
            _ => {
                return Err(AppError::InvalidArgument(format!(
                    "parent_id must reference a {} of the parent request",
                    kind.resource()
                )))
            }
        }
    }

    Ok(())
}

fn apply_patch(row: &mut KeyValue, patch: KeyValueUpdate) -> AppResult<()> {
    let patches_delta = patch.delta_key.is_some()
        || patch.delta_value.is_some()
        || patch.delta_enabled.is_some()
        || patch.delta_description.is_some()
        || patch.delta_display_order.is_some();
    if patches_delta && row.parent_id.is_none() {
        return Err(AppError::InvalidArgument(
            "delta fields can only be set on an override".to_string(),
        ));
    }

    if let Some(key) = patch.key {
        row.key = key;
    }
    if let Some(value) = patch.value {
        row.value = value;
    }
    if let Some(enabled) = patch.enabled {
        row.enabled = enabled;
    }
    if let Some(description) = patch.description {
        row.description = description;
    }
    if let Some(order) = patch.display_order {
        row.display_order = order;
    }
    if patch.delta_key.is_some() {
        row.delta_key = patch.delta_key;
    }
    if patch.delta_value.is_some() {
        row.delta_value = patch.delta_value;
    }
    if patch.delta_enabled.is_some() {
        row.delta_enabled = patch.delta_enabled;
    }
    if patch.delta_description.is_some() {
        row.delta_description = patch.delta_description;
    }
    if patch.delta_display_order.is_some() {
        row.delta_display_order = patch.delta_display_order;
    }
    Ok(())
}

fn publish<I>(
    streams: &EventStreams,
    kind: KeyValueKind,
    owners: &HashMap<Uuid, Http>,
    events: I,
    rows: &[KeyValue],
) where
    I: IntoIterator<Item = SyncEvent<KeyValue>>,
{
    let stream = streams.key_value(kind);
    for (event, row) in events.into_iter().zip(rows) {
        if let Some(owner) = owners.get(&row.http_id) {
            stream.publish(Topic::workspace(owner.workspace_id), event);
        }
    }
}
