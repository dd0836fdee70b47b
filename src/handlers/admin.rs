use super::{apply_invalidation, ConfirmQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::models::AdminRole;
use crate::response::ApiResponse;
use crate::services::audit::AuditRecorder;
use crate::services::dashboard::SessionRegistry;
use crate::services::identity::SharedIdentityProvider;
use crate::services::mutation::{MutationOutcome, MutationService};
use crate::store::SharedStore;
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension, Json,
};
use serde::Deserialize;
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AddAdminRequest {
    pub email: String,
    pub role: AdminRole,
    /// Creates the account when no identity exists for `email`
    #[validate(length(min = 6))]
    pub password: Option<String>,
    #[serde(default)]
    pub confirm: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/admins",
    security(("jwt_token" = [])),
    request_body = AddAdminRequest,
    responses(
        (status = 200, description = "Admin added", body = MutationOutcome),
        (status = 400, description = "Invalid email or missing password", body = AppError),
        (status = 403, description = "Super-admin only", body = AppError),
        (status = 409, description = "Already an admin", body = AppError),
        (status = 428, description = "Confirmation required", body = AppError),
    ),
    tag = "admins"
)]
pub async fn add_admin(
    Extension(store): Extension<SharedStore>,
    Extension(audit): Extension<AuditRecorder>,
    Extension(sessions): Extension<SessionRegistry>,
    Extension(identities): Extension<SharedIdentityProvider>,
    admin: AdminContext,
    Json(payload): Json<AddAdminRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let outcome = MutationService::new(store, audit)
        .add_admin(
            &admin,
            identities.as_ref(),
            payload.email.trim(),
            payload.role,
            payload.password.as_deref(),
            payload.confirm,
        )
        .await?;
    apply_invalidation(&sessions, &admin, &outcome).await;
    let notice = outcome.notice.clone();
    Ok(ApiResponse::with_message(outcome, notice))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateAdminRoleRequest {
    pub role: AdminRole,
    #[serde(default)]
    pub confirm: bool,
}

#[utoipa::path(
    put,
    path = "/api/v1/admins/{id}/role",
    security(("jwt_token" = [])),
    params(("id" = String, Path, description = "Admin ID")),
    request_body = UpdateAdminRoleRequest,
    responses(
        (status = 200, description = "Role changed", body = MutationOutcome),
        (status = 400, description = "Cannot change own role", body = AppError),
        (status = 403, description = "Super-admin only", body = AppError),
        (status = 404, description = "Admin not found", body = AppError),
        (status = 428, description = "Confirmation required", body = AppError),
    ),
    tag = "admins"
)]
pub async fn update_admin_role(
    Extension(store): Extension<SharedStore>,
    Extension(audit): Extension<AuditRecorder>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
    Path(id): Path<String>,
    Json(payload): Json<UpdateAdminRoleRequest>,
) -> AppResult<impl IntoResponse> {
    let outcome = MutationService::new(store, audit)
        .set_admin_role(&admin, &id, payload.role, payload.confirm)
        .await?;
    apply_invalidation(&sessions, &admin, &outcome).await;
    let notice = outcome.notice.clone();
    Ok(ApiResponse::with_message(outcome, notice))
}

#[utoipa::path(
    delete,
    path = "/api/v1/admins/{id}",
    security(("jwt_token" = [])),
    params(("id" = String, Path, description = "Admin ID"), ConfirmQuery),
    responses(
        (status = 200, description = "Admin removed", body = MutationOutcome),
        (status = 400, description = "Cannot remove yourself", body = AppError),
        (status = 403, description = "Super-admin only", body = AppError),
        (status = 404, description = "Admin not found", body = AppError),
        (status = 428, description = "Confirmation required", body = AppError),
    ),
    tag = "admins"
)]
pub async fn remove_admin(
    Extension(store): Extension<SharedStore>,
    Extension(audit): Extension<AuditRecorder>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
    Path(id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> AppResult<impl IntoResponse> {
    let outcome = MutationService::new(store, audit)
        .remove_admin(&admin, &id, query.confirm)
        .await?;
    apply_invalidation(&sessions, &admin, &outcome).await;
    let notice = outcome.notice.clone();
    Ok(ApiResponse::with_message(outcome, notice))
}
