use super::{apply_invalidation, ConfirmQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::models::UserStatus;
use crate::response::ApiResponse;
use crate::services::audit::AuditRecorder;
use crate::services::dashboard::SessionRegistry;
use crate::services::mutation::{MutationOutcome, MutationService};
use crate::store::SharedStore;
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use utoipa::ToSchema;

#[utoipa::path(
    delete,
    path = "/api/v1/users/{id}",
    security(("jwt_token" = [])),
    params(("id" = String, Path, description = "User ID"), ConfirmQuery),
    responses(
        (status = 200, description = "User deleted", body = MutationOutcome),
        (status = 404, description = "User not found", body = AppError),
        (status = 428, description = "Confirmation required", body = AppError),
    ),
    tag = "users"
)]
pub async fn delete_user(
    Extension(store): Extension<SharedStore>,
    Extension(audit): Extension<AuditRecorder>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
    Path(id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> AppResult<impl IntoResponse> {
    let outcome = MutationService::new(store, audit)
        .delete_user(&admin, &id, query.confirm)
        .await?;
    apply_invalidation(&sessions, &admin, &outcome).await;
    let notice = outcome.notice.clone();
    Ok(ApiResponse::with_message(outcome, notice))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateStatusRequest {
    /// active or suspended
    pub status: UserStatus,
    #[serde(default)]
    pub confirm: bool,
}

#[utoipa::path(
    put,
    path = "/api/v1/users/{id}/status",
    security(("jwt_token" = [])),
    params(("id" = String, Path, description = "User ID")),
    request_body = UpdateStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = MutationOutcome),
        (status = 404, description = "User not found", body = AppError),
        (status = 409, description = "User already has that status", body = AppError),
        (status = 428, description = "Confirmation required", body = AppError),
    ),
    tag = "users"
)]
pub async fn update_user_status(
    Extension(store): Extension<SharedStore>,
    Extension(audit): Extension<AuditRecorder>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = MutationService::new(store, audit)
        .set_user_status(&admin, &id, payload.status, payload.confirm)
        .await?;
    apply_invalidation(&sessions, &admin, &outcome).await;
    let notice = outcome.notice.clone();
    Ok(ApiResponse::with_message(outcome, notice))
}
