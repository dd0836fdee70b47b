//! Identity provider seam.
//!
//! The dashboard only needs sign-in, session lookup, sign-out and password
//! reset from its identity provider. [`LocalIdentityProvider`] keeps bcrypt
//! credentials, session records and hashed reset tokens in the document
//! store.

use crate::error::{AppError, AppResult, AuthError};
use crate::models::timestamp;
use crate::services::email::EmailService;
use crate::store::{
    FieldFilter, SharedStore, StoreQuery, IDENTITIES, PASSWORD_RESETS, SESSIONS,
};
use crate::utils::password::{generate_reset_token, hash_reset_token};
use crate::utils::{hash_password, verify_password};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

pub const MIN_PASSWORD_LEN: usize = 6;
const RESET_TOKEN_TTL_MINUTES: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Persistence {
    /// Survives a browser restart.
    Persistent,
    /// Ends with the browser session.
    SessionOnly,
}

impl Persistence {
    pub fn from_keep_logged_in(keep: bool) -> Self {
        if keep {
            Persistence::Persistent
        } else {
            Persistence::SessionOnly
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, Persistence::Persistent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedInSession {
    pub identity: Identity,
    pub session_id: String,
    pub persistence: Persistence,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        persistence: Persistence,
    ) -> AppResult<SignedInSession>;

    /// The live session, or `None` once it has been signed out.
    async fn session(&self, session_id: &str) -> AppResult<Option<SignedInSession>>;

    async fn sign_out(&self, session_id: &str) -> AppResult<()>;

    /// Unknown addresses succeed silently.
    async fn send_password_reset(&self, email: &str) -> AppResult<()>;

    async fn confirm_password_reset(&self, token: &str, new_password: &str) -> AppResult<()>;

    async fn create_identity(&self, email: &str, password: &str) -> AppResult<Identity>;

    async fn lookup_by_email(&self, email: &str) -> AppResult<Option<Identity>>;
}

pub type SharedIdentityProvider = Arc<dyn IdentityProvider>;

/// Same shape as `^[^\s@]+@[^\s@]+\.[^\s@]+$`.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}

pub fn validate_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters."
        )));
    }
    Ok(())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Sliding-window attempt counter keyed by email.
#[derive(Debug, Clone)]
pub struct Throttle {
    attempts: Arc<DashMap<String, (u32, Instant)>>,
    max_attempts: u32,
    window: Duration,
}

impl Throttle {
    pub fn new(max_attempts: u32, window: Duration) -> Self {
        Self {
            attempts: Arc::new(DashMap::new()),
            max_attempts,
            window,
        }
    }

    pub fn is_blocked(&self, key: &str) -> bool {
        let window = self.window;
        if self
            .attempts
            .remove_if(key, |_, (_, since)| since.elapsed() >= window)
            .is_some()
        {
            return false;
        }
        self.attempts
            .get(key)
            .is_some_and(|entry| entry.0 >= self.max_attempts)
    }

    /// Count an attempt for `key`, dropping every window that has lapsed.
    pub fn record(&self, key: &str) {
        let window = self.window;
        self.attempts.retain(|_, (_, since)| since.elapsed() < window);

        let mut entry = self
            .attempts
            .entry(key.to_string())
            .or_insert((0, Instant::now()));
        entry.0 += 1;
    }

    /// Keys with an open window.
    pub fn tracked(&self) -> usize {
        self.attempts.len()
    }

    pub fn clear(&self, key: &str) {
        self.attempts.remove(key);
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredIdentity {
    id: String,
    email: String,
    password_hash: String,
    #[serde(default)]
    disabled: bool,
}

impl From<&StoredIdentity> for Identity {
    fn from(stored: &StoredIdentity) -> Self {
        Identity {
            id: stored.id.clone(),
            email: stored.email.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredSession {
    id: String,
    identity_id: String,
    email: String,
    #[serde(default)]
    persistent: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredReset {
    identity_id: String,
    expires_at: String,
}

/// Identity provider keeping credentials in the `identities` collection.
#[derive(Clone)]
pub struct LocalIdentityProvider {
    store: SharedStore,
    email: EmailService,
    sign_in_throttle: Throttle,
    reset_throttle: Throttle,
}

impl LocalIdentityProvider {
    pub fn new(store: SharedStore, email: EmailService) -> Self {
        Self {
            store,
            email,
            sign_in_throttle: Throttle::new(5, Duration::from_secs(15 * 60)),
            reset_throttle: Throttle::new(3, Duration::from_secs(15 * 60)),
        }
    }

    pub fn with_throttles(mut self, sign_in: Throttle, reset: Throttle) -> Self {
        self.sign_in_throttle = sign_in;
        self.reset_throttle = reset;
        self
    }

    async fn find_identity(&self, email: &str) -> AppResult<Option<StoredIdentity>> {
        let query = StoreQuery::collection(IDENTITIES)
            .filter(FieldFilter::eq("email", normalize_email(email)))
            .limit(1);
        let found = self.store.query(&query).await?;
        match found.first() {
            Some(doc) => Ok(Some(doc.decode()?)),
            None => Ok(None),
        }
    }

    async fn open_session(
        &self,
        identity: Identity,
        persistence: Persistence,
    ) -> AppResult<SignedInSession> {
        let mut data = Map::new();
        data.insert("identityId".to_string(), json!(identity.id));
        data.insert("email".to_string(), json!(identity.email));
        data.insert("persistent".to_string(), json!(persistence.is_persistent()));
        let session_id = self.store.add(SESSIONS, data, Some("createdAt")).await?;

        Ok(SignedInSession {
            identity,
            session_id,
            persistence,
        })
    }

    async fn end_sessions_of(&self, identity_id: &str) -> AppResult<()> {
        let query =
            StoreQuery::collection(SESSIONS).filter(FieldFilter::eq("identityId", identity_id));
        for session in self.store.query(&query).await? {
            self.store.delete(SESSIONS, &session.id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn authenticate(
        &self,
        email: &str,
        password: &str,
        persistence: Persistence,
    ) -> AppResult<SignedInSession> {
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail.into());
        }
        let key = normalize_email(email);
        if self.sign_in_throttle.is_blocked(&key) {
            tracing::warn!("Sign-in throttled for {}", key);
            return Err(AuthError::TooManyRequests.into());
        }

        let stored = match self.find_identity(&key).await? {
            Some(stored) if verify_password(password, &stored.password_hash)? => stored,
            _ => {
                self.sign_in_throttle.record(&key);
                return Err(AuthError::InvalidCredential.into());
            }
        };
        if stored.disabled {
            return Err(AuthError::Disabled.into());
        }

        self.sign_in_throttle.clear(&key);
        let session = self.open_session(Identity::from(&stored), persistence).await?;
        tracing::info!("Identity {} signed in", session.identity.id);
        Ok(session)
    }

    async fn session(&self, session_id: &str) -> AppResult<Option<SignedInSession>> {
        let Some(doc) = self.store.get(SESSIONS, session_id).await? else {
            return Ok(None);
        };
        let stored: StoredSession = doc.decode()?;
        Ok(Some(SignedInSession {
            identity: Identity {
                id: stored.identity_id,
                email: stored.email,
            },
            session_id: stored.id,
            persistence: Persistence::from_keep_logged_in(stored.persistent),
        }))
    }

    async fn sign_out(&self, session_id: &str) -> AppResult<()> {
        self.store.delete(SESSIONS, session_id).await?;
        tracing::info!("Session {} signed out", session_id);
        Ok(())
    }

    async fn send_password_reset(&self, email: &str) -> AppResult<()> {
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail.into());
        }
        let key = normalize_email(email);
        if self.reset_throttle.is_blocked(&key) {
            return Err(AuthError::TooManyRequests.into());
        }
        self.reset_throttle.record(&key);

        let Some(stored) = self.find_identity(&key).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(());
        };

        let token = generate_reset_token();
        let expires_at = Utc::now() + ChronoDuration::minutes(RESET_TOKEN_TTL_MINUTES);
        self.store
            .set(
                PASSWORD_RESETS,
                &hash_reset_token(&token),
                json!({
                    "identityId": stored.id,
                    "expiresAt": timestamp::format(&expires_at),
                }),
            )
            .await?;

        if let Err(e) = self.email.send_password_reset_email(&stored.email, &token).await {
            tracing::warn!("Failed to send password reset email: {e}");
        }
        Ok(())
    }

    async fn confirm_password_reset(&self, token: &str, new_password: &str) -> AppResult<()> {
        validate_password(new_password)?;

        let digest = hash_reset_token(token);
        let invalid = || AppError::Validation("Invalid or expired reset link.".to_string());
        let doc = self
            .store
            .get(PASSWORD_RESETS, &digest)
            .await?
            .ok_or_else(invalid)?;
        // One use only, valid or not.
        self.store.delete(PASSWORD_RESETS, &digest).await?;

        let reset: StoredReset = doc.decode()?;
        let expired = timestamp::parse(&reset.expires_at)
            .map(|at| at <= Utc::now())
            .unwrap_or(true);
        if expired {
            return Err(invalid());
        }

        let mut fields = Map::new();
        fields.insert(
            "passwordHash".to_string(),
            Value::String(hash_password(new_password)?),
        );
        self.store
            .update(IDENTITIES, &reset.identity_id, fields)
            .await?;
        self.end_sessions_of(&reset.identity_id).await?;
        tracing::info!("Password reset for identity {}", reset.identity_id);
        Ok(())
    }

    async fn create_identity(&self, email: &str, password: &str) -> AppResult<Identity> {
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail.into());
        }
        validate_password(password)?;
        if self.find_identity(email).await?.is_some() {
            return Err(AppError::Conflict(
                "An account with this email already exists.".to_string(),
            ));
        }

        let email = normalize_email(email);
        let mut data = Map::new();
        data.insert("email".to_string(), json!(email));
        data.insert("passwordHash".to_string(), json!(hash_password(password)?));
        data.insert("disabled".to_string(), json!(false));
        let id = self.store.add(IDENTITIES, data, Some("createdAt")).await?;
        Ok(Identity { id, email })
    }

    async fn lookup_by_email(&self, email: &str) -> AppResult<Option<Identity>> {
        Ok(self.find_identity(email).await?.as_ref().map(Identity::from))
    }
}
