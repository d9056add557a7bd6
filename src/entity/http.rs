use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How the request body is encoded on the wire
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "snake_case")]
pub enum BodyKind {
    #[default]
    #[sea_orm(string_value = "unspecified")]
    Unspecified,
    #[sea_orm(string_value = "none")]
    #[serde(rename = "none")]
    Empty,
    #[sea_orm(string_value = "raw")]
    Raw,
    #[sea_orm(string_value = "form_data")]
    FormData,
    #[sea_orm(string_value = "url_encoded")]
    UrlEncoded,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "http")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
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

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::workspace::Entity",
        from = "Column::WorkspaceId",
        to = "super::workspace::Column::Id",
        on_delete = "Cascade"
    )]
    Workspace,
    #[sea_orm(has_many = "super::http_version::Entity")]
    Versions,
    #[sea_orm(has_many = "super::http_response::Entity")]
    Responses,
}

impl Related<super::workspace::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Workspace.def()
    }
}

impl Related<super::http_version::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Versions.def()
    }
}

impl Related<super::http_response::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Responses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
