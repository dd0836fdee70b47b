use crate::error::AppResult;
use crate::models::timestamp;
use crate::services::identity::IdentityProvider;
use crate::store::{DocumentStore, ADMINS};
use serde_json::json;
use std::env;

#[derive(Debug, Clone)]
pub struct BootstrapAdminConfig {
    pub email: String,
    pub password: String,
}

impl BootstrapAdminConfig {
    pub fn from_env() -> Option<Self> {
        if !crate::config::parse_bool_env("BOOTSTRAP_ADMIN_ENABLED", false) {
            return None;
        }

        Some(Self {
            email: env::var("BOOTSTRAP_ADMIN_EMAIL").ok()?,
            password: env::var("BOOTSTRAP_ADMIN_PASSWORD").ok()?,
        })
    }
}

/// Seed the first super-admin at startup:
/// - any admin record already present: nothing to do
/// - identity with the configured email exists: grant it super-admin
/// - otherwise create the identity, then grant super-admin
pub async fn ensure_bootstrap_admin(
    store: &dyn DocumentStore,
    identities: &dyn IdentityProvider,
    cfg: &BootstrapAdminConfig,
) -> AppResult<bool> {
    if store.count(ADMINS, &[]).await? > 0 {
        return Ok(false);
    }

    let identity = match identities.lookup_by_email(&cfg.email).await? {
        Some(identity) => identity,
        None => identities.create_identity(&cfg.email, &cfg.password).await?,
    };

    store
        .set(
            ADMINS,
            &identity.id,
            json!({
                "email": identity.email,
                "role": "super-admin",
                "createdAt": timestamp::now(),
            }),
        )
        .await?;
    tracing::info!("Bootstrap super-admin {} created", identity.email);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Admin, AdminRole};
    use crate::services::email::EmailService;
    use crate::services::identity::LocalIdentityProvider;
    use crate::store::MemoryStore;
    use std::sync::Arc;

    #[tokio::test]
    async fn seeds_once() {
        let store = MemoryStore::new();
        let identities = LocalIdentityProvider::new(Arc::new(store.clone()), EmailService::disabled());
        let cfg = BootstrapAdminConfig {
            email: "root@artisans.test".to_string(),
            password: "secret1".to_string(),
        };

        assert!(ensure_bootstrap_admin(&store, &identities, &cfg).await.unwrap());
        assert!(!ensure_bootstrap_admin(&store, &identities, &cfg).await.unwrap());

        let identity = identities
            .lookup_by_email("root@artisans.test")
            .await
            .unwrap()
            .unwrap();
        let admin: Admin = store
            .get(ADMINS, &identity.id)
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(admin.role, AdminRole::SuperAdmin);
    }
}
