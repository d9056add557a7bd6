use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// The four key/value child collections of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum KeyValueKind {
    Header,
    SearchParam,
    BodyForm,
    BodyUrlEncoded,
}

impl KeyValueKind {
    pub const ALL: [KeyValueKind; 4] = [
        KeyValueKind::Header,
        KeyValueKind::SearchParam,
        KeyValueKind::BodyForm,
        KeyValueKind::BodyUrlEncoded,
    ];

    /// Resource name used in error messages
    pub fn resource(&self) -> &'static str {
        match self {
            KeyValueKind::Header => "Header",
            KeyValueKind::SearchParam => "SearchParam",
            KeyValueKind::BodyForm => "BodyForm",
            KeyValueKind::BodyUrlEncoded => "BodyUrlEncoded",
        }
    }
}

/// Header, search param, form field or url-encoded field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct KeyValue {
    pub id: Uuid,
    pub http_id: Uuid,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,

    // Delta companions
    pub is_delta: bool,
    /// Base row this override replaces
    pub parent_id: Option<Uuid>,
    pub delta_key: Option<String>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
}

impl KeyValue {
    /// Copy of this row under another request with a fresh id and no delta metadata
    pub fn detached(&self, id: Uuid, http_id: Uuid) -> Self {
        Self {
            id,
            http_id,
            key: self.key.clone(),
            value: self.value.clone(),
            enabled: self.enabled,
            description: self.description.clone(),
            display_order: self.display_order,
            is_delta: false,
            parent_id: None,
            delta_key: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct KeyValueInsert {
    pub id: String,
    pub http_id: String,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub value: String,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub display_order: Option<f64>,

    /// Base row to override; only valid when `http_id` is a delta
    pub parent_id: Option<String>,
    pub delta_key: Option<String>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct KeyValueUpdate {
    pub id: String,
    pub key: Option<String>,
    pub value: Option<String>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub display_order: Option<f64>,
    pub delta_key: Option<String>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
}
