use axum::{response::IntoResponse, Json};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> axum::response::Response {
        Json(self).into_response()
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message.into()),
        }
    }
}

/// One page of a cursor-paginated list. There is no total: the client only
/// learns whether a further page exists.
#[derive(Debug, Serialize, ToSchema)]
pub struct CursorPage<T: Serialize> {
    pub items: Vec<T>,
    pub page: usize,
    pub has_more: bool,
    pub has_prev: bool,
}

impl<T: Serialize> CursorPage<T> {
    pub fn new(items: Vec<T>, page: usize, has_more: bool) -> Self {
        Self {
            items,
            page,
            has_more,
            has_prev: page > 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
