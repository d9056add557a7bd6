use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Raw request body. At most one per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BodyRaw {
    pub id: Uuid,
    pub http_id: Uuid,
    #[serde(with = "crate::models::bytes")]
    #[schema(value_type = String, format = Byte)]
    pub raw_data: Vec<u8>,
    #[serde(with = "crate::models::bytes::option")]
    #[schema(value_type = Option<String>, format = Byte)]
    pub delta_raw_data: Option<Vec<u8>>,
    pub is_delta: bool,
    pub created_at: i64,
    pub updated_at: i64,
}

impl BodyRaw {
    /// Bytes this row contributes to a resolved body. Only a delta body's
    /// override is ever consulted.
    pub fn effective_data(&self) -> &[u8] {
        match &self.delta_raw_data {
            Some(delta) if self.is_delta && !delta.is_empty() => delta,
            _ => &self.raw_data,
        }
    }
}

/// Byte fields are base64 text
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct BodyRawInsert {
    pub id: String,
    pub http_id: String,
    #[serde(default)]
    pub raw_data: String,
    pub delta_raw_data: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct BodyRawUpdate {
    pub id: String,
    pub raw_data: Option<String>,
    pub delta_raw_data: Option<String>,
}
