//! Merges a base request with a delta override into the request that is
//! actually sent.

use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::models::{Assert, BodyRaw, Http, KeyValue, KeyValueKind};
use crate::repositories::{
    AssertRepository, BodyRawRepository, HttpRepository, KeyValueRepository, Repository,
};

/// A request with every child row, as stored
#[derive(Debug, Clone, Default)]
pub struct HttpTree {
    pub headers: Vec<KeyValue>,
    pub search_params: Vec<KeyValue>,
    pub body_forms: Vec<KeyValue>,
    pub body_urlencoded: Vec<KeyValue>,
    pub asserts: Vec<Assert>,
    pub body_raw: Option<BodyRaw>,
}

impl HttpTree {
    pub async fn load(db: &DatabaseConnection, http_id: Uuid) -> AppResult<Self> {
        let (headers, search_params, body_forms, body_urlencoded, asserts, body_raw) = tokio::try_join!(
            KeyValueRepository::list_by_http(db, KeyValueKind::Header, http_id),
            KeyValueRepository::list_by_http(db, KeyValueKind::SearchParam, http_id),
            KeyValueRepository::list_by_http(db, KeyValueKind::BodyForm, http_id),
            KeyValueRepository::list_by_http(db, KeyValueKind::BodyUrlEncoded, http_id),
            AssertRepository::list_by_http(db, http_id),
            BodyRawRepository::find_by_http(db, http_id),
        )?;

        Ok(Self {
            headers,
            search_params,
            body_forms,
            body_urlencoded,
            asserts,
            body_raw,
        })
    }

    pub fn key_values(&self, kind: KeyValueKind) -> &[KeyValue] {
        match kind {
            KeyValueKind::Header => &self.headers,
            KeyValueKind::SearchParam => &self.search_params,
            KeyValueKind::BodyForm => &self.body_forms,
            KeyValueKind::BodyUrlEncoded => &self.body_urlencoded,
        }
    }
}

/// The concrete request: scalars and children with every override applied
/// and no delta metadata left.
#[derive(Debug, Clone)]
pub struct ResolvedHttp {
    pub http: Http,
    pub headers: Vec<KeyValue>,
    pub search_params: Vec<KeyValue>,
    pub body_forms: Vec<KeyValue>,
    pub body_urlencoded: Vec<KeyValue>,
    pub asserts: Vec<Assert>,
    pub body_raw: Option<BodyRaw>,
}

impl ResolvedHttp {
    pub fn key_values(&self, kind: KeyValueKind) -> &[KeyValue] {
        match kind {
            KeyValueKind::Header => &self.headers,
            KeyValueKind::SearchParam => &self.search_params,
            KeyValueKind::BodyForm => &self.body_forms,
            KeyValueKind::BodyUrlEncoded => &self.body_urlencoded,
        }
    }

    pub fn key_values_mut(&mut self, kind: KeyValueKind) -> &mut Vec<KeyValue> {
        match kind {
            KeyValueKind::Header => &mut self.headers,
            KeyValueKind::SearchParam => &mut self.search_params,
            KeyValueKind::BodyForm => &mut self.body_forms,
            KeyValueKind::BodyUrlEncoded => &mut self.body_urlencoded,
        }
    }

    /// Raw body bytes, empty when the request has none
    pub fn raw_bytes(&self) -> &[u8] {
        self.body_raw.as_ref().map(|b| b.raw_data.as_slice()).unwrap_or_default()
    }
}

/// Child rows that take part in delta merging
pub trait DeltaChild: Clone {
    fn id(&self) -> Uuid;
    fn parent_id(&self) -> Option<Uuid>;
    fn display_order(&self) -> f64;
    /// Override that removes its base row
    fn suppresses(&self) -> bool;
    /// Copy every present `delta_*` field of `delta` onto this base row
    fn apply(&mut self, delta: &Self);
    fn clear_delta(&mut self);
}

impl DeltaChild for KeyValue {
    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn display_order(&self) -> f64 {
        self.display_order
    }

    fn suppresses(&self) -> bool {
        self.delta_enabled == Some(false)
    }

    fn apply(&mut self, delta: &Self) {
        if let Some(key) = &delta.delta_key {
            self.key = key.clone();
        }
        if let Some(value) = &delta.delta_value {
            self.value = value.clone();
        }
        if let Some(enabled) = delta.delta_enabled {
            self.enabled = enabled;
        }
        if let Some(description) = &delta.delta_description {
            self.description = description.clone();
        }
        if let Some(order) = delta.delta_display_order {
            self.display_order = order;
        }
    }

    fn clear_delta(&mut self) {
        self.is_delta = false;
        self.parent_id = None;
        self.delta_key = None;
        self.delta_value = None;
        self.delta_enabled = None;
        self.delta_description = None;
        self.delta_display_order = None;
    }
}

impl DeltaChild for Assert {
    fn id(&self) -> Uuid {
        self.id
    }

    fn parent_id(&self) -> Option<Uuid> {
        self.parent_id
    }

    fn display_order(&self) -> f64 {
        self.display_order
    }

    fn suppresses(&self) -> bool {
        self.delta_enabled == Some(false)
    }

    fn apply(&mut self, delta: &Self) {
        if let Some(value) = &delta.delta_value {
            self.value = value.clone();
        }
        if let Some(enabled) = delta.delta_enabled {
            self.enabled = enabled;
        }
        if let Some(description) = &delta.delta_description {
            self.description = description.clone();
        }
        if let Some(order) = delta.delta_display_order {
            self.display_order = order;
        }
    }

    fn clear_delta(&mut self) {
        self.is_delta = false;
        self.parent_id = None;
        self.delta_value = None;
        self.delta_enabled = None;
        self.delta_description = None;
        self.delta_display_order = None;
    }
}

/// Merge one child collection.
///
/// Overrides (`parent_id` set) patch or suppress the base row they point at;
/// every other delta row is an addition. Output is ordered by
/// `display_order`, ties broken by id.
pub fn merge_children<T: DeltaChild>(base: &[T], delta: &[T]) -> Vec<T> {
    let mut merged: Vec<T> = base.to_vec();
    let mut suppressed = Vec::new();

    for row in delta {
        match row.parent_id() {
            Some(parent_id) => match merged.iter_mut().find(|b| b.id() == parent_id) {
                Some(target) => {
                    if row.suppresses() {
                        suppressed.push(parent_id);
                    } else {
                        target.apply(row);
                    }
                }
                None => {
                    tracing::warn!(
                        override_id = %row.id(),
                        %parent_id,
                        "override points at an unknown base row, ignored"
                    );
                }
            },
            None => merged.push(row.clone()),
        }
    }

    merged.retain(|row| !suppressed.contains(&row.id()));
    for row in merged.iter_mut() {
        row.clear_delta();
    }
    merged.sort_by(|a, b| {
        a.display_order()
            .total_cmp(&b.display_order())
            .then_with(|| a.id().cmp(&b.id()))
    });
    merged
}

fn pick(delta: &Option<String>, base: &str) -> String {
    match delta {
        Some(value) if !value.is_empty() => value.clone(),
        _ => base.to_string(),
    }
}

/// Scalars of the resolved request. The id is the delta's.
pub fn merge_http(parent: &Http, delta: &Http) -> Http {
    let mut http = parent.clone();
    http.id = delta.id;
    http.workspace_id = delta.workspace_id;
    http.name = pick(&delta.delta_name, &parent.name);
    http.url = pick(&delta.delta_url, &parent.url);
    http.method = pick(&delta.delta_method, &parent.method);
    http.description = pick(&delta.delta_description, &parent.description);
    if let Some(kind) = delta.delta_body_kind {
        http.body_kind = kind;
    }
    http.display_order = delta.display_order;
    http.last_run_at = delta.last_run_at;
    http.created_at = delta.created_at;
    http.updated_at = delta.updated_at;
    http.is_snapshot = false;
    http.clear_delta();
    http
}

fn flatten_body(body: &BodyRaw) -> BodyRaw {
    BodyRaw {
        raw_data: body.effective_data().to_vec(),
        delta_raw_data: None,
        is_delta: false,
        ..body.clone()
    }
}

/// The delta's body when it carries bytes, otherwise the base's
pub fn merge_body(base: Option<&BodyRaw>, delta: Option<&BodyRaw>) -> Option<BodyRaw> {
    match delta {
        Some(body) if !body.effective_data().is_empty() => Some(flatten_body(body)),
        _ => base.map(flatten_body),
    }
}

/// Resolve a delta against its parent
pub fn resolve(parent: &Http, parent_tree: &HttpTree, delta: &Http, delta_tree: &HttpTree) -> ResolvedHttp {
    ResolvedHttp {
        http: merge_http(parent, delta),
        headers: merge_children(&parent_tree.headers, &delta_tree.headers),
        search_params: merge_children(&parent_tree.search_params, &delta_tree.search_params),
        body_forms: merge_children(&parent_tree.body_forms, &delta_tree.body_forms),
        body_urlencoded: merge_children(&parent_tree.body_urlencoded, &delta_tree.body_urlencoded),
        asserts: merge_children(&parent_tree.asserts, &delta_tree.asserts),
        body_raw: merge_body(parent_tree.body_raw.as_ref(), delta_tree.body_raw.as_ref()),
    }
}

/// A base request in resolved form
pub fn flatten(http: &Http, tree: &HttpTree) -> ResolvedHttp {
    let mut http = http.clone();
    http.clear_delta();
    ResolvedHttp {
        http,
        headers: merge_children(&tree.headers, &[]),
        search_params: merge_children(&tree.search_params, &[]),
        body_forms: merge_children(&tree.body_forms, &[]),
        body_urlencoded: merge_children(&tree.body_urlencoded, &[]),
        asserts: merge_children(&tree.asserts, &[]),
        body_raw: tree.body_raw.as_ref().map(flatten_body),
    }
}

pub struct ResolverService;

impl ResolverService {
    /// Load a request and produce its resolved form
    pub async fn resolve(db: &DatabaseConnection, http: &Http) -> AppResult<ResolvedHttp> {
        let parent_id = match (http.is_delta, http.parent_http_id) {
            (true, Some(parent_id)) => parent_id,
            _ => {
                let tree = HttpTree::load(db, http.id).await?;
                return Ok(flatten(http, &tree));
            }
        };

        let parent = HttpRepository::find_by_id(db, parent_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::NotFound("Parent request".to_string()),
                other => other,
            })?;

        let (parent_tree, delta_tree) =
            tokio::try_join!(HttpTree::load(db, parent.id), HttpTree::load(db, http.id))?;

        Ok(resolve(&parent, &parent_tree, http, &delta_tree))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::BodyKind;

    fn http(name: &str) -> Http {
        Http {
            id: Uuid::now_v7(),
            workspace_id: Uuid::now_v7(),
            name: name.to_string(),
            url: "https://api.example.com/items".to_string(),
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

    fn kv(http_id: Uuid, key: &str, value: &str, order: f64) -> KeyValue {
        KeyValue {
            id: Uuid::now_v7(),
            http_id,
            key: key.to_string(),
            value: value.to_string(),
            enabled: true,
            description: String::new(),
            display_order: order,
            is_delta: false,
            parent_id: None,
            delta_key: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
        }
    }

    fn override_of(http_id: Uuid, base: &KeyValue) -> KeyValue {
        KeyValue {
            is_delta: true,
            parent_id: Some(base.id),
            ..kv(http_id, "", "", 0.0)
        }
    }

    #[test]
    fn test_delta_scalar_wins_when_non_empty() {
        let parent = http("List items");
        let mut delta = http("");
        delta.is_delta = true;
        delta.parent_http_id = Some(parent.id);
        delta.delta_url = Some("https://staging.example.com/items".to_string());
        delta.delta_name = Some(String::new());
        delta.delta_body_kind = Some(BodyKind::Raw);

        let merged = merge_http(&parent, &delta);
        assert_eq!(merged.id, delta.id);
        assert_eq!(merged.url, "https://staging.example.com/items");
        assert_eq!(merged.name, "List items");
        assert_eq!(merged.method, "GET");
        assert_eq!(merged.body_kind, BodyKind::Raw);
        assert!(!merged.is_delta);
        assert!(merged.parent_http_id.is_none());
    }

    #[test]
    fn test_override_replaces_only_present_fields() {
        let base_id = Uuid::now_v7();
        let delta_id = Uuid::now_v7();
        let auth = kv(base_id, "Authorization", "Bearer base", 1.0);
        let accept = kv(base_id, "Accept", "application/json", 2.0);

        let mut patch = override_of(delta_id, &auth);
        patch.delta_value = Some("Bearer delta".to_string());

        let merged = merge_children(&[auth.clone(), accept.clone()], &[patch]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, auth.id);
        assert_eq!(merged[0].key, "Authorization");
        assert_eq!(merged[0].value, "Bearer delta");
        assert_eq!(merged[1].value, "application/json");
        assert!(merged.iter().all(|r| !r.is_delta && r.parent_id.is_none()));
    }

    #[test]
    fn test_disabled_override_suppresses_base_row() {
        let base_id = Uuid::now_v7();
        let auth = kv(base_id, "Authorization", "Bearer base", 1.0);
        let mut suppress = override_of(Uuid::now_v7(), &auth);
        suppress.delta_enabled = Some(false);

        let merged = merge_children(&[auth], &[suppress]);
        assert!(merged.is_empty());
    }

    #[test]
    fn test_additions_are_merged_in_display_order() {
        let base_id = Uuid::now_v7();
        let delta_id = Uuid::now_v7();
        let first = kv(base_id, "a", "1", 1.0);
        let third = kv(base_id, "c", "3", 3.0);
        let second = kv(delta_id, "b", "2", 2.0);

        let merged = merge_children(&[first, third], &[second]);
        let keys: Vec<_> = merged.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["a", "b", "c"]);
    }

    #[test]
    fn test_override_can_move_a_row() {
        let base_id = Uuid::now_v7();
        let first = kv(base_id, "a", "1", 1.0);
        let second = kv(base_id, "b", "2", 2.0);
        let mut moved = override_of(Uuid::now_v7(), &first);
        moved.delta_display_order = Some(5.0);

        let merged = merge_children(&[first, second], &[moved]);
        let keys: Vec<_> = merged.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["b", "a"]);
    }

    #[test]
    fn test_orphan_override_is_ignored() {
        let base = kv(Uuid::now_v7(), "a", "1", 1.0);
        let mut orphan = kv(Uuid::now_v7(), "", "", 0.0);
        orphan.is_delta = true;
        orphan.parent_id = Some(Uuid::now_v7());
        orphan.delta_value = Some("x".to_string());

        let merged = merge_children(&[base.clone()], &[orphan]);
        assert_eq!(merged, vec![base]);
    }

    #[test]
    fn test_equal_order_ties_break_by_id() {
        let http_id = Uuid::now_v7();
        let a = kv(http_id, "a", "", 1.0);
        let b = kv(http_id, "b", "", 1.0);

        let merged = merge_children(&[b.clone(), a.clone()], &[]);
        assert_eq!(merged[0].id, a.id.min(b.id));
    }

    #[test]
    fn test_body_prefers_non_empty_delta() {
        let body = |raw: &[u8], delta: Option<&[u8]>| BodyRaw {
            id: Uuid::now_v7(),
            http_id: Uuid::now_v7(),
            raw_data: raw.to_vec(),
            delta_raw_data: delta.map(|d| d.to_vec()),
            is_delta: delta.is_some(),
            created_at: 0,
            updated_at: 0,
        };

        let base = body(b"base", None);
        let delta = body(b"", Some(b"delta"));
        let merged = merge_body(Some(&base), Some(&delta)).unwrap();
        assert_eq!(merged.raw_data, b"delta");
        assert!(merged.delta_raw_data.is_none());

        let empty = body(b"", Some(b""));
        let merged = merge_body(Some(&base), Some(&empty)).unwrap();
        assert_eq!(merged.raw_data, b"base");

        assert!(merge_body(None, None).is_none());
    }
}
