use crate::services::pagination::PaginationError;
use crate::store::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use thiserror::Error;

/// Failures reported by the identity provider. The display text is what the
/// sign-in page shows to the admin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email address format.")]
    InvalidEmail,

    #[error("Incorrect email or password. Please try again.")]
    InvalidCredential,

    #[error("This account has been disabled.")]
    Disabled,

    #[error("Too many failed login attempts. Please try again later.")]
    TooManyRequests,

    #[error("Network error. Please check your internet connection.")]
    Network,

    #[error("Email/password sign-in is not enabled. Please contact support.")]
    OperationNotAllowed,
}

impl AuthError {
    fn status(&self) -> StatusCode {
        match self {
            AuthError::InvalidEmail => StatusCode::BAD_REQUEST,
            AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AuthError::Disabled | AuthError::OperationNotAllowed => StatusCode::FORBIDDEN,
            AuthError::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            AuthError::Network => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Authentication failed")]
    Unauthorized,

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Access denied. You are not an admin.")]
    AccessDenied,

    #[error("Forbidden")]
    Forbidden,

    #[error("Not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Pagination error: {0}")]
    Pagination(#[from] PaginationError),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Confirmation required: {0}")]
    ConfirmationRequired(String),

    #[error("Partial failure: {0}")]
    PartialFailure(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl utoipa::ToSchema for AppError {
    fn name() -> std::borrow::Cow<'static, str> {
        "ErrorResponse".into()
    }
}

impl utoipa::PartialSchema for AppError {
    fn schema() -> utoipa::openapi::RefOr<utoipa::openapi::schema::Schema> {
        ErrorResponse::schema()
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Store(StoreError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppError::Store(StoreError::CursorMismatch) => StatusCode::BAD_REQUEST,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Auth(e) => e.status(),
            AppError::Unauthorized | AppError::Jwt(_) => StatusCode::UNAUTHORIZED,
            AppError::AccessDenied | AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_) | AppError::Pagination(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ConfirmationRequired(_) => StatusCode::PRECONDITION_REQUIRED,
            AppError::PartialFailure(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error_message = match self {
            AppError::Store(StoreError::NotFound { .. }) => "Resource not found".to_string(),
            AppError::Store(StoreError::CursorMismatch) => {
                "Cursor does not belong to this query".to_string()
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {:?}", e);
                "Database error".to_string()
            }
            AppError::Auth(e) => e.to_string(),
            AppError::Unauthorized => "Unauthorized".to_string(),
            AppError::Jwt(e) => {
                tracing::error!("JWT error: {:?}", e);
                "Invalid token".to_string()
            }
            AppError::AccessDenied => "Access denied. You are not an admin.".to_string(),
            AppError::Forbidden => "Forbidden".to_string(),
            AppError::NotFound => "Resource not found".to_string(),
            AppError::Validation(msg) | AppError::Conflict(msg) => msg,
            AppError::Pagination(e) => e.to_string(),
            AppError::ConfirmationRequired(prompt) => prompt,
            AppError::PartialFailure(msg) => {
                tracing::error!("Partial failure: {}", msg);
                "The action only partly completed. Please review and try again.".to_string()
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:?}", e);
                "Internal server error".to_string()
            }
        };

        let body = json!({
            "error": error_message,
        });

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_to_human_messages() {
        assert_eq!(
            AuthError::InvalidCredential.to_string(),
            "Incorrect email or password. Please try again."
        );
        assert_eq!(
            AppError::from(AuthError::TooManyRequests).status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn missing_document_is_not_found() {
        let err = AppError::from(StoreError::NotFound {
            collection: "users".to_string(),
            id: "u1".to_string(),
        });
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn confirmation_required_is_428() {
        let err = AppError::ConfirmationRequired("Delete this post?".to_string());
        assert_eq!(err.status(), StatusCode::PRECONDITION_REQUIRED);
    }
}
