use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub next_cursor: Option<String>,
    pub has_more: Option<bool>,
}

impl Meta {
    pub fn cursor(next_cursor: Option<String>, has_more: bool) -> Self {
        Self {
            next_cursor,
            has_more: Some(has_more),
        }
    }

    pub fn empty() -> Self {
        Self {
            next_cursor: None,
            has_more: None,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T, meta: Option<Meta>) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta,
        }
    }
}
