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
    delete,
    path = "/api/v1/posts/{id}",
    security(("jwt_token" = [])),
    params(("id" = String, Path, description = "Post ID"), ConfirmQuery),
    responses(
        (status = 200, description = "Post deleted", body = MutationOutcome),
        (status = 404, description = "Post not found", body = AppError),
        (status = 428, description = "Confirmation required", body = AppError),
    ),
    tag = "posts"
)]
pub async fn delete_post(
    Extension(store): Extension<SharedStore>,
    Extension(audit): Extension<AuditRecorder>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
    Path(id): Path<String>,
    Query(query): Query<ConfirmQuery>,
) -> AppResult<impl IntoResponse> {
    let outcome = MutationService::new(store, audit)
        .delete_post(&admin, &id, query.confirm)
        .await?;
    apply_invalidation(&sessions, &admin, &outcome).await;
    let notice = outcome.notice.clone();
    Ok(ApiResponse::with_message(outcome, notice))
}
