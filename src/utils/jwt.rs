use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

static JWT_CONFIG: OnceLock<crate::config::jwt::JwtConfig> = OnceLock::new();

/// Initialize JWT config from environment. Must be called once at startup.
pub fn init_jwt_config(config: crate::config::jwt::JwtConfig) -> Result<()> {
    JWT_CONFIG
        .set(config)
        .map_err(|_| anyhow::anyhow!("JWT config already initialized"))?;
    Ok(())
}

fn get_config() -> Result<&'static crate::config::jwt::JwtConfig> {
    JWT_CONFIG
        .get()
        .ok_or_else(|| anyhow::anyhow!("JWT config not initialized"))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Identity id.
    pub sub: String,
    /// Session record id.
    pub sid: String,
    pub exp: usize,
    pub iat: usize,
    #[serde(default)]
    pub persistent: bool,
}

/// Token lifetime for the chosen persistence mode.
pub fn session_ttl_seconds(persistent: bool) -> u64 {
    match get_config() {
        Ok(config) if persistent => config.persistent_session_ttl,
        Ok(config) => config.session_ttl,
        Err(_) if persistent => 2_592_000,
        Err(_) => 43_200,
    }
}

pub fn encode_session_token(identity_id: &str, session_id: &str, persistent: bool) -> Result<String> {
    let config = get_config()?;
    let now = chrono::Utc::now().timestamp() as usize;
    let claims = Claims {
        sub: identity_id.to_owned(),
        sid: session_id.to_owned(),
        exp: now + session_ttl_seconds(persistent) as usize,
        iat: now,
        persistent,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))
}

pub fn decode_jwt(token: &str) -> Result<Claims> {
    let config = get_config()?;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| anyhow::anyhow!("Failed to decode JWT: {}", e))
}
