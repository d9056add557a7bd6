use std::collections::HashMap;

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{EventStreams, SyncEvent, Topic};
use crate::ids;
use crate::models::{Assert, AssertInsert, AssertUpdate, DeleteItem, Http};
use crate::repositories::{self, AssertRepository, Repository};
use crate::services::access::Gate;
use crate::services::http::{owning_requests, visible_http_ids};

/// Longest assertion source accepted, in bytes
pub const MAX_EXPRESSION_LENGTH: usize = 4096;

/// CRUD for request assertions
pub struct AssertService;

impl AssertService {
    pub async fn collection(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<Assert>> {
        let http_ids = visible_http_ids(db, user_id).await?;
        AssertRepository::list_by_https(db, &http_ids).await
    }

    pub async fn insert(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        items: Vec<AssertInsert>,
    ) -> AppResult<Vec<Assert>> {
        let mut rows = Vec::with_capacity(items.len());
        for item in items {
            check_length(&item.value)?;
            if let Some(value) = &item.delta_value {
                check_length(value)?;
            }
            let parent_id = ids::parse_optional_id(item.parent_id.as_deref(), "parent_id")?;
            rows.push(Assert {
                id: ids::parse_id(&item.id, "id")?,
                http_id: ids::parse_id(&item.http_id, "http_id")?,
                value: item.value,
                enabled: item.enabled.unwrap_or(true),
                description: item.description.unwrap_or_default(),
                display_order: item.display_order.unwrap_or(0.0),
                is_delta: parent_id.is_some(),
                parent_id,
                delta_value: item.delta_value,
                delta_enabled: item.delta_enabled,
                delta_description: item.delta_description,
                delta_display_order: item.delta_display_order,
            });
        }

        let http_ids: Vec<Uuid> = rows.iter().map(|r| r.http_id).collect();
        let owners = owning_requests(db, user_id, &http_ids, Gate::Write).await?;

        let parent_ids: Vec<Uuid> = rows.iter().filter_map(|r| r.parent_id).collect();
        let parents: HashMap<Uuid, Assert> = AssertRepository::find_many(db, &parent_ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        for row in rows.iter().filter(|r| r.parent_id.is_some()) {
            let owner = &owners[&row.http_id];
            let parent = row.parent_id.and_then(|id| parents.get(&id));
            match parent {
                Some(parent) if owner.is_delta && Some(parent.http_id) == owner.parent_http_id => {}
                _ => {
                    return Err(AppError::InvalidArgument(
                        "parent_id must reference an assertion of the parent request".to_string(),
                    ))
                }
            }
        }

        let txn = repositories::begin(db).await?;
        AssertRepository::tx(&txn).insert_many(&rows).await?;
        repositories::commit(txn).await?;

        for row in &rows {
            publish(streams, &owners, row.http_id, SyncEvent::insert(row.clone()));
        }
        Ok(rows)
    }

    pub async fn update(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        items: Vec<AssertUpdate>,
    ) -> AppResult<Vec<Assert>> {
        let ids: Vec<Uuid> = items
            .iter()
            .map(|item| ids::parse_id(&item.id, "id"))
            .collect::<AppResult<_>>()?;
        let mut existing: HashMap<Uuid, Assert> = AssertRepository::find_many(db, &ids)
            .await?
            .into_iter()
            .map(|a| (a.id, a))
            .collect();
        if ids.iter().any(|id| !existing.contains_key(id)) {
            return Err(AppError::NotFound("Assert".to_string()));
        }

        let http_ids: Vec<Uuid> = existing.values().map(|a| a.http_id).collect();
        let owners = owning_requests(db, user_id, &http_ids, Gate::Write).await?;

        let mut rows = Vec::with_capacity(items.len());
        for (id, patch) in ids.iter().zip(items) {
            let mut row = existing
                .remove(id)
                .ok_or_else(|| AppError::InvalidArgument("duplicate id in batch".to_string()))?;
            let patches_delta = patch.delta_value.is_some()
                || patch.delta_enabled.is_some()
                || patch.delta_description.is_some()
                || patch.delta_display_order.is_some();
            if patches_delta && row.parent_id.is_none() {
                return Err(AppError::InvalidArgument(
                    "delta fields can only be set on an override".to_string(),
                ));
            }
            if let Some(value) = patch.value {
                check_length(&value)?;
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
            if let Some(value) = patch.delta_value {
                check_length(&value)?;
                row.delta_value = Some(value);
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
            rows.push(row);
        }

        let txn = repositories::begin(db).await?;
        let writer = AssertRepository::tx(&txn);
        for row in &rows {
            writer.update(row).await?;
        }
        repositories::commit(txn).await?;

        for row in &rows {
            publish(streams, &owners, row.http_id, SyncEvent::update(row.clone()));
        }
        Ok(rows)
    }

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
        let rows = AssertRepository::find_many(db, &ids).await?;
        if rows.len() != ids.len() {
            return Err(AppError::NotFound("Assert".to_string()));
        }

        let http_ids: Vec<Uuid> = rows.iter().map(|a| a.http_id).collect();
        let owners = owning_requests(db, user_id, &http_ids, Gate::Delete).await?;

        let txn = repositories::begin(db).await?;
        AssertRepository::tx(&txn).delete_many(&ids).await?;
        repositories::commit(txn).await?;

        for row in &rows {
            publish(streams, &owners, row.http_id, SyncEvent::delete(row.id));
        }
        Ok(ids)
    }
}

fn check_length(value: &str) -> AppResult<()> {
    if value.len() > MAX_EXPRESSION_LENGTH {
        return Err(AppError::InvalidArgument(format!(
            "assertion longer than {} bytes",
            MAX_EXPRESSION_LENGTH
        )));
    }
    Ok(())
}

fn publish(
    streams: &EventStreams,
    owners: &HashMap<Uuid, Http>,
    http_id: Uuid,
    event: SyncEvent<Assert>,
) {
    if let Some(owner) = owners.get(&http_id) {
        streams
            .assert
            .publish(Topic::workspace(owner.workspace_id), event);
    }
}
