use crate::{
    error::{AppError, AppResult},
    models::{Admin, AdminRole},
    services::{dashboard::SessionRegistry, identity::SharedIdentityProvider},
    store::{SharedStore, ADMINS},
    utils::{
        cookie::{append_set_cookie, build_clear_cookie, extract_cookie, ACCESS_TOKEN_COOKIE},
        jwt::decode_jwt,
    },
};
use axum::{
    extract::{FromRequestParts, Request},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};
use chrono::{DateTime, Utc};

/// The signed-in administrator, available to every guarded handler.
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub id: String,
    pub email: String,
    pub role: AdminRole,
    /// Identity-provider session, also the dashboard session key.
    pub session_id: String,
    /// When the session token stops being accepted.
    pub expires_at: DateTime<Utc>,
}

/// Why a token did not yield an admin.
#[derive(Debug)]
pub enum Denial {
    /// No usable token or the session was signed out.
    Unauthenticated,
    /// Signed in, but not an admin. The session has been ended.
    NotAdmin,
}

impl From<Denial> for AppError {
    fn from(denial: Denial) -> Self {
        match denial {
            Denial::Unauthenticated => AppError::Unauthorized,
            Denial::NotAdmin => AppError::AccessDenied,
        }
    }
}

/// Resolve a session token to an admin. Identities without an admin record,
/// and any failure while looking one up, are signed out.
pub async fn authorize(
    token: &str,
    store: &SharedStore,
    identities: &SharedIdentityProvider,
    sessions: &SessionRegistry,
) -> Result<AdminContext, Denial> {
    let claims = decode_jwt(token).map_err(|_| Denial::Unauthenticated)?;

    let session = match identities.session(&claims.sid).await {
        Ok(Some(session)) if session.identity.id == claims.sub => session,
        Ok(_) => return Err(Denial::Unauthenticated),
        Err(e) => {
            tracing::warn!("Session lookup failed for {}: {}", claims.sid, e);
            return Err(Denial::Unauthenticated);
        }
    };

    let admin = match store.get(ADMINS, &claims.sub).await {
        Ok(Some(doc)) => doc.decode::<Admin>().map_err(|e| {
            tracing::warn!("Unreadable admin record {}: {}", claims.sub, e);
        }),
        Ok(None) => Err(()),
        Err(e) => {
            tracing::warn!("Admin lookup failed for {}: {}", claims.sub, e);
            Err(())
        }
    };

    match admin {
        Ok(admin) => Ok(AdminContext {
            id: claims.sub,
            email: admin.email,
            role: admin.role,
            session_id: session.session_id,
            expires_at: DateTime::from_timestamp(claims.exp as i64, 0).unwrap_or_else(Utc::now),
        }),
        Err(()) => {
            tracing::warn!("Identity {} is not an admin, signing out", claims.sub);
            if let Err(e) = identities.sign_out(&claims.sid).await {
                tracing::warn!("Forced sign-out of {} failed: {}", claims.sid, e);
            }
            sessions.release(&claims.sid);
            Err(Denial::NotAdmin)
        }
    }
}

/// Admin guard middleware
///
/// Accepts the session token from the Authorization header or the auth
/// cookie, requires an admin record for the identity, attaches the
/// [`AdminContext`] and makes sure the dashboard session exists.
pub async fn admin_guard(
    Extension(store): Extension<SharedStore>,
    Extension(identities): Extension<SharedIdentityProvider>,
    Extension(sessions): Extension<SessionRegistry>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Prefer Authorization: Bearer, fallback to HttpOnly cookie.
    let token = extract_bearer_token(&headers)
        .or_else(|| extract_cookie(&headers, ACCESS_TOKEN_COOKIE))
        .ok_or(AppError::Unauthorized)?;

    let admin = match authorize(&token, &store, &identities, &sessions).await {
        Ok(admin) => admin,
        Err(Denial::NotAdmin) => {
            let mut response = AppError::AccessDenied.into_response();
            append_set_cookie(&mut response, &build_clear_cookie(ACCESS_TOKEN_COOKIE))?;
            return Ok(response);
        }
        Err(denial) => return Err(denial.into()),
    };

    sessions
        .get_or_start(&admin.session_id, &admin.id, admin.expires_at)
        .await;

    let email = admin.email.clone();
    request.extensions_mut().insert(admin);
    let mut response = next.run(request).await;

    if let Ok(value) = HeaderValue::from_str(&email) {
        response.headers_mut().insert("x-admin-email", value);
    }
    Ok(response)
}

fn extract_bearer_token(headers: &HeaderMap) -> Option<String> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())?;

    let token = auth_header.strip_prefix("Bearer ")?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

/// Admin management is reserved to super-admins.
pub fn require_super_admin(admin: &AdminContext) -> AppResult<()> {
    if admin.role.can_manage_admins() {
        Ok(())
    } else {
        tracing::warn!("Admin {} attempted admin management", admin.email);
        Err(AppError::Forbidden)
    }
}

impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminContext>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
