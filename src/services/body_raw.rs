use std::collections::{HashMap, HashSet};

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{EventStreams, SyncEvent, Topic};
use crate::ids;
use crate::models::{bytes, BodyRaw, BodyRawInsert, BodyRawUpdate, DeleteItem, Http};
use crate::repositories::{self, BodyRawRepository, Repository};
use crate::services::access::Gate;
use crate::services::http::{owning_requests, visible_http_ids};

/// CRUD for raw request bodies; one body per request
pub struct BodyRawService;

impl BodyRawService {
    pub async fn collection(db: &DatabaseConnection, user_id: Uuid) -> AppResult<Vec<BodyRaw>> {
        let http_ids = visible_http_ids(db, user_id).await?;
        BodyRawRepository::list_by_https(db, &http_ids).await
    }

    pub async fn insert(
        db: &DatabaseConnection,
        streams: &EventStreams,
        user_id: Uuid,
        items: Vec<BodyRawInsert>,
    ) -> AppResult<Vec<BodyRaw>> {
        let now = ids::now_unix();
        let mut rows = Vec::with_capacity(items.len());
        for item in &items {
            let delta_raw_data = item
                .delta_raw_data
                .as_deref()
                .map(|raw| bytes::decode(raw, "delta_raw_data"))
                .transpose()?;
            rows.push(BodyRaw {
                id: ids::parse_id(&item.id, "id")?,
                http_id: ids::parse_id(&item.http_id, "http_id")?,
                raw_data: bytes::decode(&item.raw_data, "raw_data")?,
                delta_raw_data,
                is_delta: false,
                created_at: now,
                updated_at: now,
            });
        }

        let http_ids: Vec<Uuid> = rows.iter().map(|r| r.http_id).collect();
        if http_ids.len() != http_ids.iter().collect::<HashSet<_>>().len() {
            return Err(AppError::InvalidArgument(
                "a request has at most one raw body".to_string(),
            ));
        }
        let owners = owning_requests(db, user_id, &http_ids, Gate::Write).await?;

        // A body is a delta body exactly when its request is a delta
        for row in rows.iter_mut() {
            row.is_delta = owners[&row.http_id].is_delta;
            if !row.is_delta && row.delta_raw_data.is_some() {
                return Err(delta_on_base());
            }
        }

        let txn = repositories::begin(db).await?;
        BodyRawRepository::tx(&txn).insert_many(&rows).await?;
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
        items: Vec<BodyRawUpdate>,
    ) -> AppResult<Vec<BodyRaw>> {
        let ids: Vec<Uuid> = items
            .iter()
            .map(|item| ids::parse_id(&item.id, "id"))
            .collect::<AppResult<_>>()?;
        let mut existing: HashMap<Uuid, BodyRaw> = BodyRawRepository::find_many(db, &ids)
            .await?
            .into_iter()
            .map(|b| (b.id, b))
            .collect();
        if ids.iter().any(|id| !existing.contains_key(id)) {
            return Err(AppError::NotFound("BodyRaw".to_string()));
        }

        let http_ids: Vec<Uuid> = existing.values().map(|b| b.http_id).collect();
        let owners = owning_requests(db, user_id, &http_ids, Gate::Write).await?;

        let now = ids::now_unix();
        let mut rows = Vec::with_capacity(items.len());
        for (id, patch) in ids.iter().zip(items) {
            let mut row = existing
                .remove(id)
                .ok_or_else(|| AppError::InvalidArgument("duplicate id in batch".to_string()))?;
            if let Some(raw) = patch.raw_data {
                row.raw_data = bytes::decode(&raw, "raw_data")?;
            }
            if let Some(raw) = patch.delta_raw_data {
                if !row.is_delta {
                    return Err(delta_on_base());
                }
                row.delta_raw_data = Some(bytes::decode(&raw, "delta_raw_data")?);
            }
            row.updated_at = now;
            rows.push(row);
        }

        let txn = repositories::begin(db).await?;
        let writer = BodyRawRepository::tx(&txn);
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
        let rows = BodyRawRepository::find_many(db, &ids).await?;
        if rows.len() != ids.len() {
            return Err(AppError::NotFound("BodyRaw".to_string()));
        }

        let http_ids: Vec<Uuid> = rows.iter().map(|b| b.http_id).collect();
        let owners = owning_requests(db, user_id, &http_ids, Gate::Delete).await?;

        let txn = repositories::begin(db).await?;
        BodyRawRepository::tx(&txn).delete_many(&ids).await?;
        repositories::commit(txn).await?;

        for row in &rows {
            publish(streams, &owners, row.http_id, SyncEvent::delete(row.id));
        }
        Ok(ids)
    }
}

fn delta_on_base() -> AppError {
    AppError::InvalidArgument("delta_raw_data requires a delta request".to_string())
}

fn publish(
    streams: &EventStreams,
    owners: &HashMap<Uuid, Http>,
    http_id: Uuid,
    event: SyncEvent<BodyRaw>,
) {
    if let Some(owner) = owners.get(&http_id) {
        streams
            .body_raw
            .publish(Topic::workspace(owner.workspace_id), event);
    }
}
