pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod response;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;
pub mod websocket;

pub use error::{AppError, AppResult};
pub use middleware::auth::AdminContext;
pub use response::{ApiResponse, CursorPage};

use axum::{extract::Extension, middleware::from_fn, Router};
use config::dashboard::DashboardConfig;
use services::audit::AuditRecorder;
use services::dashboard::SessionRegistry;
use services::identity::SharedIdentityProvider;
use store::SharedStore;

/// Everything the handlers pull out of request extensions.
#[derive(Clone)]
pub struct AppContext {
    pub store: SharedStore,
    pub identities: SharedIdentityProvider,
    pub sessions: SessionRegistry,
    pub dashboard: DashboardConfig,
    pub audit: AuditRecorder,
}

impl AppContext {
    /// Must be called inside a Tokio runtime: it starts the expired-session
    /// sweeper.
    pub fn new(
        store: SharedStore,
        identities: SharedIdentityProvider,
        dashboard: DashboardConfig,
    ) -> Self {
        let sessions = SessionRegistry::new(store.clone(), dashboard);
        sessions.spawn_sweeper(dashboard.session_sweep_interval);
        Self {
            sessions,
            audit: AuditRecorder::new(store.clone()),
            store,
            identities,
            dashboard,
        }
    }
}

/// API and websocket routes with security headers and shared state attached.
pub fn create_app(ctx: AppContext) -> Router {
    routes::create_routes()
        .layer(from_fn(middleware::security::security_headers_middleware))
        .layer(Extension(ctx.store))
        .layer(Extension(ctx.identities))
        .layer(Extension(ctx.sessions))
        .layer(Extension(ctx.dashboard))
        .layer(Extension(ctx.audit))
}
