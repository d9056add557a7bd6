use serde::{Serialize, Serializer};
use utoipa::ToSchema;
use uuid::Uuid;

/// A stored response. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Response {
    pub id: Uuid,
    pub http_id: Uuid,
    pub status: i32,
    /// UTF-8 bodies as text, anything else as a byte-count placeholder
    #[serde(serialize_with = "serialize_body")]
    #[schema(value_type = String)]
    pub body: Vec<u8>,
    pub time: i64,
    pub duration_ms: i64,
    pub size: i64,
    pub created_at: i64,
}

impl Response {
    pub fn body_text(&self) -> String {
        display_body(&self.body)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResponseHeader {
    pub id: Uuid,
    pub response_id: Uuid,
    pub header_key: String,
    pub header_value: String,
}

/// Outcome of one assertion for one response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResponseAssert {
    pub id: Uuid,
    pub response_id: Uuid,
    /// The expression text, or `ERROR: <cause>` when evaluation faulted
    pub value: String,
    pub success: bool,
    pub created_at: i64,
}

/// Render a body for display without losing the fact that it was binary
pub fn display_body(body: &[u8]) -> String {
    match std::str::from_utf8(body) {
        Ok(text) => text.to_string(),
        Err(_) => format!("[Binary data: {} bytes]", body.len()),
    }
}

fn serialize_body<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&display_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binary_body_renders_placeholder() {
        assert_eq!(display_body(b"plain"), "plain");
        assert_eq!(display_body(&[0xff, 0xfe, 0x00]), "[Binary data: 3 bytes]");
    }
}
