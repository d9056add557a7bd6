use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "http_response")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub http_id: Uuid,
    pub status: i32,
    pub body: Vec<u8>,
    pub time: i64,
    pub duration_ms: i64,
    pub size: i64,
    pub created_at: i64,
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
    #[sea_orm(has_many = "super::http_response_header::Entity")]
    Headers,
    #[sea_orm(has_many = "super::http_response_assert::Entity")]
    Asserts,
}

impl Related<super::http::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Http.def()
    }
}

impl Related<super::http_response_header::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Headers.def()
    }
}

impl Related<super::http_response_assert::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Asserts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
