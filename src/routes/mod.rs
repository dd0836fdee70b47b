use crate::config::rate_limit::{RateLimitConfig, RateLimitRule};
use crate::handlers;
use crate::middleware::auth::admin_guard;
use crate::websocket;
use axum::{middleware, routing, Router};
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

pub fn create_routes() -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        // Authenticated inside the handler via the `token` query parameter
        .route(
            "/ws/pending-reports",
            routing::get(websocket::pending_reports::ws_handler),
        )
}

fn api_routes() -> Router {
    let rate_limit_config = RateLimitConfig::from_env();

    let auth = auth_routes(&rate_limit_config);
    let read = read_routes(&rate_limit_config).layer(middleware::from_fn(admin_guard));
    let mutation = mutation_routes(&rate_limit_config).layer(middleware::from_fn(admin_guard));

    auth.merge(read).merge(mutation)
}

/// Sign-in and password recovery; no session required.
fn auth_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/login", routing::post(handlers::login))
        .route(
            "/auth/forgot-password",
            routing::post(handlers::auth::forgot_password),
        )
        .route(
            "/auth/reset-password",
            routing::post(handlers::auth::reset_password),
        );

    with_optional_rate_limit(router, config.enabled, config.auth)
}

/// Dashboard reads for any admin.
fn read_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/me", routing::get(handlers::get_current_admin))
        .route(
            "/views/{view}",
            routing::get(handlers::dashboard::get_view),
        )
        .route(
            "/overview",
            routing::get(handlers::dashboard::get_overview),
        )
        .route(
            "/analytics",
            routing::get(handlers::dashboard::get_analytics),
        )
        .route(
            "/ratings/top-artists",
            routing::get(handlers::dashboard::get_top_artists),
        )
        .route(
            "/reports/pending-count",
            routing::get(handlers::dashboard::get_pending_count),
        );

    with_optional_rate_limit(router, config.enabled, config.read)
}

/// Session changes and confirmed admin actions.
fn mutation_routes(config: &RateLimitConfig) -> Router {
    let router = Router::new()
        .route("/auth/logout", routing::post(handlers::auth::logout))
        .route(
            "/dashboard/init",
            routing::post(handlers::dashboard::init_dashboard),
        )
        // Users
        .route(
            "/users/{id}",
            routing::delete(handlers::user::delete_user),
        )
        .route(
            "/users/{id}/status",
            routing::put(handlers::user::update_user_status),
        )
        // Posts
        .route(
            "/posts/{id}",
            routing::delete(handlers::post::delete_post),
        )
        // Reports
        .route(
            "/reports/{id}/approve",
            routing::put(handlers::report::approve_report),
        )
        .route(
            "/reports/{id}/reject",
            routing::put(handlers::report::reject_report),
        )
        // Admins (super-admin only, checked in the service)
        .route("/admins", routing::post(handlers::admin::add_admin))
        .route(
            "/admins/{id}",
            routing::delete(handlers::admin::remove_admin),
        )
        .route(
            "/admins/{id}/role",
            routing::put(handlers::admin::update_admin_role),
        );

    with_optional_rate_limit(router, config.enabled, config.mutation)
}

fn with_optional_rate_limit(router: Router, enabled: bool, rule: RateLimitRule) -> Router {
    if !enabled {
        return router;
    }

    match GovernorConfigBuilder::default()
        .per_second(rule.per_second)
        .burst_size(rule.burst_size)
        .finish()
    {
        Some(governor_conf) => router.layer(GovernorLayer::new(governor_conf)),
        None => {
            tracing::warn!(
                "Invalid rate limit rule {}:{}, serving without a limit",
                rule.per_second,
                rule.burst_size
            );
            router
        }
    }
}
