use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entity::BodyKind;

/// A request template. One row type covers base, delta and snapshot states.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Http {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub name: String,
    pub url: String,
    pub method: String,
    pub description: String,
    pub body_kind: BodyKind,
    pub display_order: f64,
    pub last_run_at: Option<i64>,

    // Inheritance
    pub parent_http_id: Option<Uuid>,
    pub is_delta: bool,
    pub delta_name: Option<String>,
    pub delta_url: Option<String>,
    pub delta_method: Option<String>,
    pub delta_description: Option<String>,
    pub delta_body_kind: Option<BodyKind>,

    pub is_snapshot: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Http {
    /// A base request: neither a delta nor a snapshot
    pub fn is_base(&self) -> bool {
        !self.is_delta && self.parent_http_id.is_none() && !self.is_snapshot
    }

    /// Drop every inheritance field, turning the row into an independent base
    pub fn clear_delta(&mut self) {
        self.parent_http_id = None;
        self.is_delta = false;
        self.delta_name = None;
        self.delta_url = None;
        self.delta_method = None;
        self.delta_description = None;
        self.delta_body_kind = None;
    }
}

/// Insert payload; ids are chosen by the client
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct HttpInsert {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub body_kind: BodyKind,
    pub display_order: Option<f64>,

    /// Set to derive a delta from an existing base request
    pub parent_http_id: Option<String>,
    pub delta_name: Option<String>,
    pub delta_url: Option<String>,
    pub delta_method: Option<String>,
    pub delta_description: Option<String>,
    pub delta_body_kind: Option<BodyKind>,
}

/// Patch payload; omitted fields keep their stored value
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct HttpUpdate {
    pub id: String,
    pub name: Option<String>,
    pub url: Option<String>,
    pub method: Option<String>,
    pub description: Option<String>,
    pub body_kind: Option<BodyKind>,
    pub display_order: Option<f64>,
    pub delta_name: Option<String>,
    pub delta_url: Option<String>,
    pub delta_method: Option<String>,
    pub delta_description: Option<String>,
    pub delta_body_kind: Option<BodyKind>,
}

/// Optional naming for the version a run produces
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct RunOptions {
    pub version_name: Option<String>,
    pub version_description: Option<String>,
}
