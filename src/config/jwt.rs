use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime of a session-only sign-in (12 hours).
    pub session_ttl: u64,
    /// Lifetime of a "keep me logged in" sign-in (30 days).
    pub persistent_session_ttl: u64,
}

impl JwtConfig {
    pub fn from_env() -> Result<Self> {
        let secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable must be set"))?;

        if secret.len() < 32 {
            return Err(anyhow::anyhow!(
                "JWT_SECRET must be at least 32 characters"
            ));
        }

        let session_ttl = super::parse_env("SESSION_TTL_SECS", 43_200);
        let persistent_session_ttl = super::parse_env("PERSISTENT_SESSION_TTL_SECS", 2_592_000);

        if session_ttl == 0 || persistent_session_ttl == 0 {
            return Err(anyhow::anyhow!("session lifetimes must be greater than zero"));
        }

        Ok(Self {
            secret,
            session_ttl,
            persistent_session_ttl,
        })
    }
}
