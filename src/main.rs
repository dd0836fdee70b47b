use artisans_admin::config::{self, database::StoreBackend, dashboard::DashboardConfig};
use artisans_admin::services::bootstrap_admin::{ensure_bootstrap_admin, BootstrapAdminConfig};
use artisans_admin::services::email::EmailService;
use artisans_admin::services::identity::{LocalIdentityProvider, SharedIdentityProvider};
use artisans_admin::store::SharedStore;
use artisans_admin::{create_app, utils, AppContext};
use axum::{extract::Extension, response::IntoResponse, routing::get, Json, Router};
use serde_json::json;
use std::env;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health_check,
        // Auth
        artisans_admin::handlers::auth::login,
        artisans_admin::handlers::auth::get_current_admin,
        artisans_admin::handlers::auth::logout,
        artisans_admin::handlers::auth::forgot_password,
        artisans_admin::handlers::auth::reset_password,
        // Dashboard
        artisans_admin::handlers::dashboard::init_dashboard,
        artisans_admin::handlers::dashboard::get_view,
        artisans_admin::handlers::dashboard::get_overview,
        artisans_admin::handlers::dashboard::get_analytics,
        artisans_admin::handlers::dashboard::get_top_artists,
        artisans_admin::handlers::dashboard::get_pending_count,
        // Users
        artisans_admin::handlers::user::delete_user,
        artisans_admin::handlers::user::update_user_status,
        // Posts
        artisans_admin::handlers::post::delete_post,
        // Reports
        artisans_admin::handlers::report::approve_report,
        artisans_admin::handlers::report::reject_report,
        // Admins
        artisans_admin::handlers::admin::add_admin,
        artisans_admin::handlers::admin::update_admin_role,
        artisans_admin::handlers::admin::remove_admin,
    ),
    components(
        schemas(
            artisans_admin::response::ApiResponse<serde_json::Value>,
            artisans_admin::error::AppError,
            artisans_admin::models::AdminRole,
            artisans_admin::models::UserStatus,
            // Auth
            artisans_admin::handlers::auth::LoginRequest,
            artisans_admin::handlers::auth::LoginResponse,
            artisans_admin::handlers::auth::MeResponse,
            artisans_admin::handlers::auth::ForgotPasswordRequest,
            artisans_admin::handlers::auth::ResetPasswordRequest,
            // Dashboard
            artisans_admin::handlers::dashboard::DashboardInitResponse,
            artisans_admin::handlers::dashboard::ViewQuery,
            artisans_admin::handlers::dashboard::ViewPage,
            artisans_admin::handlers::dashboard::PendingCountResponse,
            artisans_admin::services::query::View,
            artisans_admin::services::pagination::Navigation,
            artisans_admin::services::table::TableRow,
            artisans_admin::services::table::UserRow,
            artisans_admin::services::table::PostRow,
            artisans_admin::services::table::ReportRow,
            artisans_admin::services::table::RatingRow,
            artisans_admin::services::table::AdminRow,
            artisans_admin::services::overview::Overview,
            artisans_admin::services::overview::OverviewStats,
            artisans_admin::services::overview::ChartSeries,
            artisans_admin::services::overview::Analytics,
            artisans_admin::services::overview::TodayCounts,
            artisans_admin::services::overview::TopArtist,
            // Mutations
            artisans_admin::services::mutation::MutationOutcome,
            artisans_admin::handlers::user::UpdateStatusRequest,
            artisans_admin::handlers::admin::AddAdminRequest,
            artisans_admin::handlers::admin::UpdateAdminRoleRequest,
        )
    ),
    tags(
        (name = "auth", description = "Admin sign-in and password recovery"),
        (name = "dashboard", description = "Paginated views, overview and analytics"),
        (name = "users", description = "User moderation"),
        (name = "posts", description = "Post moderation"),
        (name = "reports", description = "Report review"),
        (name = "admins", description = "Admin management (super-admin only)"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artisans_admin=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Fail fast on configuration before touching the store
    let jwt_config = config::jwt::JwtConfig::from_env()?;
    utils::jwt::init_jwt_config(jwt_config)?;
    let backend = StoreBackend::from_env()?;
    let dashboard = DashboardConfig::from_env();

    tracing::info!("Starting Artisans Admin v{}...", env!("CARGO_PKG_VERSION"));

    let store = config::database::connect_store(backend, &dashboard).await?;

    let email_service = EmailService::from_env();
    if email_service.is_configured() {
        tracing::info!("SMTP email service configured");
    } else {
        tracing::warn!("SMTP not configured, password reset emails will be skipped");
    }

    let identities: SharedIdentityProvider =
        Arc::new(LocalIdentityProvider::new(store.clone(), email_service));

    if let Some(bootstrap) = BootstrapAdminConfig::from_env() {
        match ensure_bootstrap_admin(store.as_ref(), identities.as_ref(), &bootstrap).await {
            Ok(false) => tracing::debug!("Admins already exist, bootstrap skipped"),
            Ok(true) => {}
            Err(e) => tracing::error!("Bootstrap admin {} failed: {}", bootstrap.email, e),
        }
    }

    let ctx = AppContext::new(store.clone(), identities, dashboard);
    let app = Router::new()
        .route("/", get(health_check))
        .merge(create_app(ctx))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(Extension(store))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer());

    let host = env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("{}:{}", host, port);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server shut down gracefully");
    Ok(())
}

fn build_cors_layer() -> CorsLayer {
    use axum::http::{header, HeaderValue, Method};

    let origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());

    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins_str == "*" {
        cors.allow_origin(tower_http::cors::Any)
    } else {
        let origins: Vec<HeaderValue> = origins_str
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

#[utoipa::path(
    get,
    path = "/",
    responses(
        (status = 200, description = "Health check successful", body = serde_json::Value)
    )
)]
async fn health_check(Extension(store): Extension<SharedStore>) -> impl IntoResponse {
    let store_ok = store.ping().await;
    let status = if store_ok { "ok" } else { "degraded" };

    Json(json!({
        "status": status,
        "service": "Artisans Admin",
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_ok,
    }))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    tracing::info!("Shutdown signal received, gracefully shutting down...");
}
