use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "http_body_urlencoded")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub http_id: Uuid,
    pub key: String,
    pub value: String,
    pub enabled: bool,
    pub description: String,
    pub display_order: f64,

    // Delta companions
    pub is_delta: bool,
    pub parent_http_body_urlencoded_id: Option<Uuid>,
    pub delta_key: Option<String>,
    pub delta_value: Option<String>,
    pub delta_enabled: Option<bool>,
    pub delta_description: Option<String>,
    pub delta_display_order: Option<f64>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::http::Entity",
        from = "Column::HttpId",
        to = "super::http::Column::Id",
        on_delete = "Cascade"
    )]
    Http,
}

impl Related<super::http::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Http.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
