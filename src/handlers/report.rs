use super::{apply_invalidation, ConfirmQuery};
use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::response::ApiResponse;
use crate::services::audit::AuditRecorder;
use crate::services::dashboard::SessionRegistry;
use crate::services::mutation::{MutationOutcome, MutationService};
use crate::store::SharedStore;
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension,
};

#[utoipa::path(
    put,
    path = "/api/v1/reports/{id}/approve",
    security(("jwt_token" = [])),
    params(("id" = String, Path, description = "Report ID"), ConfirmQuery),
    responses(
        (status = 200, description = "Post removed and report reviewed", body = MutationOutcome),
        (status = 400, description = "Report has no post", body = AppError),
        (status = 404, description = "Report or post not found", body = AppError),
        (status = 409, description = "Report already reviewed", body = AppError),
        (status = 428, description = "Confirmation required", body = AppError),
        (status = 500, description = "Post removed but report not updated", body = AppError),
    ),
    tag = "reports"
)]
pub async fn approve_report(
    Extension(store): Extension<SharedStore>,
    Extension(audit): Extension<AuditRecorder>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
    Path(id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> AppResult<impl IntoResponse> {
    let outcome = MutationService::new(store, audit)
        .approve_report(&admin, &id, query.confirm)
        .await?;
    apply_invalidation(&sessions, &admin, &outcome).await;
    let notice = outcome.notice.clone();
    Ok(ApiResponse::with_message(outcome, notice))
}

#[utoipa::path(
    put,
    path = "/api/v1/reports/{id}/reject",
    security(("jwt_token" = [])),
    params(("id" = String, Path, description = "Report ID"), ConfirmQuery),
    responses(
        (status = 200, description = "Report reviewed without action", body = MutationOutcome),
        (status = 404, description = "Report not found", body = AppError),
        (status = 409, description = "Report already reviewed", body = AppError),
        (status = 428, description = "Confirmation required", body = AppError),
    ),
    tag = "reports"
)]
pub async fn reject_report(
    Extension(store): Extension<SharedStore>,
    Extension(audit): Extension<AuditRecorder>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
    Path(id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> AppResult<impl IntoResponse> {
    let outcome = MutationService::new(store, audit)
        .reject_report(&admin, &id, query.confirm)
        .await?;
    apply_invalidation(&sessions, &admin, &outcome).await;
    let notice = outcome.notice.clone();
    Ok(ApiResponse::with_message(outcome, notice))
}
