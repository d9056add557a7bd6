//! Identifier and clock primitives.
//!
//! Ids are UUIDv7 values: 16 opaque bytes whose leading 48 bits are a
//! millisecond timestamp, so sorting by id sorts by creation time.

use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Generate a fresh time-ordered id
pub fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Current time as unix seconds
pub fn now_unix() -> i64 {
    time::OffsetDateTime::now_utc().unix_timestamp()
}

/// Parse a client-supplied id, rejecting empty and nil values
pub fn parse_id(raw: &str, field: &str) -> AppResult<Uuid> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidArgument(format!("{} is required", field)));
    }

    let id = Uuid::parse_str(trimmed)
        .map_err(|_| AppError::InvalidArgument(format!("{} is not a valid id", field)))?;

    if id.is_nil() {
        return Err(AppError::InvalidArgument(format!("{} must not be nil", field)));
    }

    Ok(id)
}

/// Parse an optional client-supplied id
pub fn parse_optional_id(raw: Option<&str>, field: &str) -> AppResult<Option<Uuid>> {
    match raw {
        Some(raw) => parse_id(raw, field).map(Some),
        None => Ok(None),
    }
}
