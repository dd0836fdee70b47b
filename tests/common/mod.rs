#![allow(dead_code)]

use artisans_admin::config::dashboard::DashboardConfig;
use artisans_admin::models::timestamp;
use artisans_admin::services::email::EmailService;
use artisans_admin::services::identity::{
    IdentityProvider, LocalIdentityProvider, SharedIdentityProvider,
};
use artisans_admin::store::{DocumentStore, MemoryStore, SharedStore, ADMINS};
use artisans_admin::{create_app, AppContext};
use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::{Arc, Once};

static INIT: Once = Once::new();

pub const PASSWORD: &str = "admin_password_123";

fn init_env() {
    INIT.call_once(|| {
        std::env::set_var(
            "JWT_SECRET",
            "integration_test_secret_that_is_at_least_32_characters_long",
        );
        std::env::set_var("RATE_LIMIT_ENABLED", "false");
        let config = artisans_admin::config::jwt::JwtConfig::from_env().unwrap();
        let _ = artisans_admin::utils::jwt::init_jwt_config(config);
    });
}

pub struct TestApp {
    pub addr: String,
    pub memory: MemoryStore,
    pub store: SharedStore,
    pub identities: SharedIdentityProvider,
    pub client: Client,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("{}/api/v1{}", self.addr, path)
    }

    /// Live pending-report stream for `token`.
    pub fn pending_reports_url(&self, token: &str) -> String {
        format!(
            "{}/ws/pending-reports?token={}",
            self.addr.replacen("http://", "ws://", 1),
            token
        )
    }
}

pub async fn spawn_app() -> TestApp {
    init_env();

    let memory = MemoryStore::new();
    let store: SharedStore = Arc::new(memory.clone());
    let identities: SharedIdentityProvider = Arc::new(LocalIdentityProvider::new(
        store.clone(),
        EmailService::disabled(),
    ));
    let dashboard = DashboardConfig {
        default_page_size: 3,
        ..DashboardConfig::default()
    };

    let app = create_app(AppContext::new(store.clone(), identities.clone(), dashboard));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        addr: format!("http://{}", addr),
        memory,
        store,
        identities,
        client: Client::new(),
    }
}

/// Create an identity with an admin record and return its id.
pub async fn create_admin(app: &TestApp, email: &str, role: &str) -> String {
    let identity = app
        .identities
        .create_identity(email, PASSWORD)
        .await
        .expect("Failed to create identity");
    app.store
        .set(
            ADMINS,
            &identity.id,
            json!({ "email": email, "role": role, "createdAt": timestamp::now() }),
        )
        .await
        .expect("Failed to create admin record");
    identity.id
}

/// Sign in and return the session token.
pub async fn login(app: &TestApp, email: &str) -> String {
    let resp = app
        .client
        .post(app.url("/auth/login"))
        .json(&json!({ "email": email, "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to sign in");

    let status = resp.status();
    let body: Value = resp.json().await.expect("Failed to parse login response");
    if !body["success"].as_bool().unwrap_or(false) {
        panic!("Failed to sign in '{}': status={}, body={}", email, status, body);
    }
    body["data"]["token"]
        .as_str()
        .expect("Login response missing token")
        .to_string()
}

/// Admin of the given role, signed in.
pub async fn admin_token(app: &TestApp, email: &str, role: &str) -> (String, String) {
    let id = create_admin(app, email, role).await;
    let token = login(app, email).await;
    (id, token)
}

/// Store a document whose `createdAt` lies `minutes_ago` in the past.
pub async fn seed(app: &TestApp, collection: &str, id: &str, mut data: Value, minutes_ago: i64) {
    data["createdAt"] = json!(timestamp::format(
        &(Utc::now() - Duration::minutes(minutes_ago))
    ));
    app.store
        .set(collection, id, data)
        .await
        .expect("Failed to seed document");
}

pub async fn get_json(app: &TestApp, path: &str, token: &str) -> (u16, Value) {
    let resp = app
        .client
        .get(app.url(path))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}
