//! Repository for the four key/value child tables.
//!
//! The tables share one shape and differ only in their entity types and in
//! the name of the column linking an override to its base row, so each table
//! gets the same set of functions generated by `key_value_table!` and the
//! public API dispatches on [`KeyValueKind`].

use sea_orm::{
    ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{KeyValue, KeyValueKind};

macro_rules! key_value_table {
    ($module:ident, $entity:ident, $parent:ident) => {
        mod $module {
            use super::*;
            use crate::entity::$entity::{ActiveModel, Column, Entity, Model};

            impl From<Model> for KeyValue {
                fn from(m: Model) -> Self {
                    Self {
                        id: m.id,
                        http_id: m.http_id,
                        key: m.key,
                        value: m.value,
                        enabled: m.enabled,
                        description: m.description,
                        display_order: m.display_order,
                        is_delta: m.is_delta,
                        parent_id: m.$parent,
                        delta_key: m.delta_key,
                        delta_value: m.delta_value,
                        delta_enabled: m.delta_enabled,
                        delta_description: m.delta_description,
                        delta_display_order: m.delta_display_order,
                    }
                }
            }

            fn to_active(kv: &KeyValue) -> ActiveModel {
                ActiveModel {
                    id: Set(kv.id),
                    http_id: Set(kv.http_id),
                    key: Set(kv.key.clone()),
                    value: Set(kv.value.clone()),
                    enabled: Set(kv.enabled),
                    description: Set(kv.description.clone()),
                    display_order: Set(kv.display_order),
                    is_delta: Set(kv.is_delta),
                    $parent: Set(kv.parent_id),
                    delta_key: Set(kv.delta_key.clone()),
                    delta_value: Set(kv.delta_value.clone()),
                    delta_enabled: Set(kv.delta_enabled),
                    delta_description: Set(kv.delta_description.clone()),
                    delta_display_order: Set(kv.delta_display_order),
                }
            }

            pub(super) async fn find_many(
                db: &DatabaseConnection,
                ids: &[Uuid],
            ) -> AppResult<Vec<KeyValue>> {
                let models = Entity::find()
                    .filter(Column::Id.is_in(ids.iter().copied()))
                    .all(db)
                    .await?;
                Ok(models.into_iter().map(KeyValue::from).collect())
            }

            pub(super) async fn list_by_https(
                db: &DatabaseConnection,
                http_ids: &[Uuid],
            ) -> AppResult<Vec<KeyValue>> {
                let models = Entity::find()
                    .filter(Column::HttpId.is_in(http_ids.iter().copied()))
                    .order_by_asc(Column::DisplayOrder)
                    .order_by_asc(Column::Id)
                    .all(db)
                    .await?;
                Ok(models.into_iter().map(KeyValue::from).collect())
            }

            pub(super) async fn insert_many(
                txn: &DatabaseTransaction,
                rows: &[KeyValue],
            ) -> AppResult<()> {
                Entity::insert_many(rows.iter().map(to_active))
                    .exec_without_returning(txn)
                    .await?;
                Ok(())
            }

            pub(super) async fn update(txn: &DatabaseTransaction, row: &KeyValue) -> AppResult<u64> {
                let result = Entity::update_many()
                    .set(to_active(row))
                    .filter(Column::Id.eq(row.id))
                    .exec(txn)
                    .await?;
                Ok(result.rows_affected)
            }

            pub(super) async fn delete_many(
                txn: &DatabaseTransaction,
                ids: &[Uuid],
            ) -> AppResult<u64> {
                let result = Entity::delete_many()
                    .filter(Column::Id.is_in(ids.iter().copied()))
                    .exec(txn)
                    .await?;
                Ok(result.rows_affected)
            }
        }
    };
}

key_value_table!(header, http_header, parent_http_header_id);
key_value_table!(search_param, http_search_param, parent_http_search_param_id);
key_value_table!(body_form, http_body_form, parent_http_body_form_id);
key_value_table!(body_urlencoded, http_body_urlencoded, parent_http_body_urlencoded_id);

/// Header, search param, form and url-encoded rows
pub struct KeyValueRepository;

impl KeyValueRepository {
    pub async fn find_by_id(
        db: &DatabaseConnection,
        kind: KeyValueKind,
        id: Uuid,
    ) -> AppResult<KeyValue> {
        Self::find_many(db, kind, &[id])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::NotFound(kind.resource().to_string()))
    }

    pub async fn find_many(
        db: &DatabaseConnection,
        kind: KeyValueKind,
        ids: &[Uuid],
    ) -> AppResult<Vec<KeyValue>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        match kind {
            KeyValueKind::Header => header::find_many(db, ids).await,
            KeyValueKind::SearchParam => search_param::find_many(db, ids).await,
            KeyValueKind::BodyForm => body_form::find_many(db, ids).await,
            KeyValueKind::BodyUrlEncoded => body_urlencoded::find_many(db, ids).await,
        }
    }

    /// Rows of one request ordered by `display_order`, ties by id
    pub async fn list_by_http(
        db: &DatabaseConnection,
        kind: KeyValueKind,
        http_id: Uuid,
    ) -> AppResult<Vec<KeyValue>> {
        Self::list_by_https(db, kind, &[http_id]).await
    }

    pub async fn list_by_https(
        db: &DatabaseConnection,
        kind: KeyValueKind,
        http_ids: &[Uuid],
    ) -> AppResult<Vec<KeyValue>> {
        if http_ids.is_empty() {
            return Ok(Vec::new());
        }

        match kind {
            KeyValueKind::Header => header::list_by_https(db, http_ids).await,
            KeyValueKind::SearchParam => search_param::list_by_https(db, http_ids).await,
            KeyValueKind::BodyForm => body_form::list_by_https(db, http_ids).await,
            KeyValueKind::BodyUrlEncoded => body_urlencoded::list_by_https(db, http_ids).await,
        }
    }

    pub fn tx(txn: &DatabaseTransaction) -> KeyValueWriter<'_> {
        KeyValueWriter { txn }
    }
}

/// Transaction-scoped key/value writes
pub struct KeyValueWriter<'a> {
    txn: &'a DatabaseTransaction,
}

impl KeyValueWriter<'_> {
    pub async fn insert_many(&self, kind: KeyValueKind, rows: &[KeyValue]) -> AppResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        match kind {
            KeyValueKind::Header => header::insert_many(self.txn, rows).await,
            KeyValueKind::SearchParam => search_param::insert_many(self.txn, rows).await,
            KeyValueKind::BodyForm => body_form::insert_many(self.txn, rows).await,
            KeyValueKind::BodyUrlEncoded => body_urlencoded::insert_many(self.txn, rows).await,
        }
    }

    pub async fn update(&self, kind: KeyValueKind, row: &KeyValue) -> AppResult<()> {
        let affected = match kind {
            KeyValueKind::Header => header::update(self.txn, row).await?,
            KeyValueKind::SearchParam => search_param::update(self.txn, row).await?,
            KeyValueKind::BodyForm => body_form::update(self.txn, row).await?,
            KeyValueKind::BodyUrlEncoded => body_urlencoded::update(self.txn, row).await?,
        };

        if affected == 0 {
            return Err(AppError::NotFound(kind.resource().to_string()));
        }

        Ok(())
    }

    pub async fn delete_many(&self, kind: KeyValueKind, ids: &[Uuid]) -> AppResult<u64> {
        if ids.is_empty() {
            return Ok(0);
        }

        match kind {
            KeyValueKind::Header => header::delete_many(self.txn, ids).await,
            KeyValueKind::SearchParam => search_param::delete_many(self.txn, ids).await,
            KeyValueKind::BodyForm => body_form::delete_many(self.txn, ids).await,
            KeyValueKind::BodyUrlEncoded => body_urlencoded::delete_many(self.txn, ids).await,
        }
    }
}
