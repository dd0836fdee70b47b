use crate::error::{AppError, AppResult, AuthError};
use crate::middleware::AdminContext;
use crate::models::{Admin, AdminRole};
use crate::response::ApiResponse;
use crate::services::dashboard::SessionRegistry;
use crate::services::identity::{
    is_valid_email, Persistence, SharedIdentityProvider, MIN_PASSWORD_LEN,
};
use crate::store::{SharedStore, ADMINS};
use crate::utils::cookie::{
    append_set_cookie, build_auth_cookie, build_clear_cookie, ACCESS_TOKEN_COOKIE,
};
use crate::utils::jwt::session_ttl_seconds;
use crate::utils::encode_session_token;
use axum::{response::IntoResponse, Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Admin email address
    pub email: String,
    /// Password (min 6 characters)
    #[validate(length(min = 6, message = "Password must be at least 6 characters."))]
    pub password: String,
    /// Keep the session after the browser closes
    #[serde(default)]
    pub keep_logged_in: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Session token, also set as the `access_token` cookie
    pub token: String,
    pub admin_id: String,
    pub email: String,
    pub role: AdminRole,
    pub persistent: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub role: AdminRole,
    pub can_manage_admins: bool,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Signed in", body = LoginResponse),
        (status = 400, description = "Invalid email or password format", body = AppError),
        (status = 401, description = "Wrong credentials", body = AppError),
        (status = 403, description = "Not an admin or account disabled", body = AppError),
        (status = 429, description = "Too many failed attempts", body = AppError),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(store): Extension<SharedStore>,
    Extension(identities): Extension<SharedIdentityProvider>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<impl IntoResponse> {
    if !is_valid_email(&payload.email) {
        return Err(AuthError::InvalidEmail.into());
    }
    payload.validate().map_err(|_| {
        AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        ))
    })?;

    let persistence = Persistence::from_keep_logged_in(payload.keep_logged_in);
    let session = identities
        .authenticate(&payload.email, &payload.password, persistence)
        .await?;

    let admin = match store.get(ADMINS, &session.identity.id).await {
        Ok(Some(doc)) => doc.decode::<Admin>().ok(),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!("Admin lookup failed at sign-in: {}", e);
            None
        }
    };
    let Some(admin) = admin else {
        identities.sign_out(&session.session_id).await?;
        return Err(AppError::AccessDenied);
    };

    let persistent = persistence.is_persistent();
    let token = encode_session_token(&session.identity.id, &session.session_id, persistent)?;
    let max_age = persistent.then(|| session_ttl_seconds(true));

    let mut response = ApiResponse::ok(LoginResponse {
        token: token.clone(),
        admin_id: session.identity.id,
        email: admin.email,
        role: admin.role,
        persistent,
    })
    .into_response();
    append_set_cookie(
        &mut response,
        &build_auth_cookie(ACCESS_TOKEN_COOKIE, &token, max_age),
    )?;
    Ok(response)
}

#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Signed-in admin", body = MeResponse),
        (status = 401, description = "Unauthorized", body = AppError),
        (status = 403, description = "Not an admin", body = AppError),
    ),
    tag = "auth"
)]
pub async fn get_current_admin(admin: AdminContext) -> AppResult<impl IntoResponse> {
    Ok(ApiResponse::ok(MeResponse {
        can_manage_admins: admin.role.can_manage_admins(),
        id: admin.id,
        email: admin.email,
        role: admin.role,
    }))
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Logout successful", body = String),
    ),
    tag = "auth"
)]
pub async fn logout(
    Extension(identities): Extension<SharedIdentityProvider>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
) -> AppResult<impl IntoResponse> {
    identities.sign_out(&admin.session_id).await?;
    sessions.release(&admin.session_id);

    let mut response = ApiResponse::ok("Logout successful").into_response();
    append_set_cookie(&mut response, &build_clear_cookie(ACCESS_TOKEN_COOKIE))?;
    Ok(response)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ForgotPasswordRequest {
    /// Email address
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/forgot-password",
    request_body = ForgotPasswordRequest,
    responses(
        (status = 200, description = "Reset link sent if the account exists", body = serde_json::Value),
        (status = 400, description = "Invalid email format", body = AppError),
        (status = 429, description = "Too many requests", body = AppError),
    ),
    tag = "auth"
)]
pub async fn forgot_password(
    Extension(identities): Extension<SharedIdentityProvider>,
    Json(payload): Json<ForgotPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    identities.send_password_reset(payload.email.trim()).await?;

    // Same answer whether or not the account exists.
    Ok(ApiResponse::ok(serde_json::json!({
        "message": "If an account with that email exists, a password reset link has been sent."
    })))
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    /// Password reset token
    #[validate(length(min = 1))]
    pub token: String,
    /// New password (min 6 characters)
    #[validate(length(min = 6))]
    pub new_password: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/auth/reset-password",
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = serde_json::Value),
        (status = 400, description = "Invalid or expired token", body = AppError),
    ),
    tag = "auth"
)]
pub async fn reset_password(
    Extension(identities): Extension<SharedIdentityProvider>,
    Json(payload): Json<ResetPasswordRequest>,
) -> AppResult<impl IntoResponse> {
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    identities
        .confirm_password_reset(&payload.token, &payload.new_password)
        .await?;

    Ok(ApiResponse::ok(serde_json::json!({
        "message": "Password has been reset successfully"
    })))
}
