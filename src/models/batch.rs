use serde::Deserialize;
use utoipa::ToSchema;

use crate::error::{AppError, AppResult};

/// Body of every batch insert/update/delete call
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct Batch<T> {
    pub items: Vec<T>,
}

impl<T> Batch<T> {
    /// Unwrap the items, rejecting an empty batch
    pub fn into_items(self) -> AppResult<Vec<T>> {
        if self.items.is_empty() {
            return Err(AppError::InvalidArgument("batch must not be empty".to_string()));
        }
        Ok(self.items)
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct DeleteItem {
    pub id: String,
}
