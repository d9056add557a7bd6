use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// An assertion expression evaluated against every response of its request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Assert {
    pub id: Uuid,
    pub http_id: Uuid,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,

    // Delta companions
    pub is_delta: bool,
    pub parent_id: Option<Uuid>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
}

impl Assert {
    pub fn detached(&self, id: Uuid, http_id: Uuid) -> Self {
        Self {
            id,
            http_id,
            value: self.value.clone(),
            enabled: self.enabled,
            description: self.description.clone(),
            display_order: self.display_order,
            is_delta: false,
            parent_id: None,
            delta_value: None,
            delta_enabled: None,
            delta_description: None,
            delta_display_order: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssertInsert {
    pub id: String,
    pub http_id: String,
    #[serde(default)]
    pub value: String,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub display_order: Option<f64>,
    pub parent_id: Option<String>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AssertUpdate {
    pub id: String,
    pub value: Option<String>,
    pub enabled: Option<bool>,
    pub description: Option<String>,
    pub display_order: Option<f64>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
}
