use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "http_body_raw")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub http_id: Uuid,
    pub raw_data: Vec<u8>,
    pub delta_raw_data: Option<Vec<u8>>,
    pub is_delta: bool,
    pub created_at: i64,
    pub updated_at: i64,
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
