use crate::config::dashboard::DashboardConfig;
use crate::error::{AppError, AppResult};
use crate::middleware::AdminContext;
use crate::response::{ApiResponse, CursorPage};
use crate::services::dashboard::SessionRegistry;
use crate::services::overview::{self, Analytics, Overview, TopArtist, TOP_ARTISTS};
use crate::services::pagination::Navigation;
use crate::services::query::{FilterSet, ReadPlan, SortSpec, View};
use crate::services::table::{render_rows, TableRow};
use crate::store::{Direction, FieldFilter, SharedStore, REPORTS};
use axum::{
    extract::{Path, Query},
    response::IntoResponse,
    Extension,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardInitResponse {
    pub email: String,
    pub views: Vec<View>,
    pub default_page_size: usize,
    pub max_page_size: usize,
    /// Live pending-report count; absent when the subscription failed.
    pub pending_reports: Option<u64>,
}

#[utoipa::path(
    post,
    path = "/api/v1/dashboard/init",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Dashboard session (re)initialised", body = DashboardInitResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "dashboard"
)]
pub async fn init_dashboard(
    Extension(sessions): Extension<SessionRegistry>,
    Extension(config): Extension<DashboardConfig>,
    admin: AdminContext,
) -> AppResult<impl IntoResponse> {
    let session = sessions
        .restart(&admin.session_id, &admin.id, admin.expires_at)
        .await;
    let pending_reports = session.lock().await.pending_count();

    Ok(ApiResponse::ok(DashboardInitResponse {
        email: admin.email,
        views: View::TABLES.to_vec(),
        default_page_size: config.default_page_size,
        max_page_size: config.max_page_size,
        pending_reports,
    }))
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct ViewQuery {
    /// first | next | prev | reload
    #[serde(default)]
    pub nav: Navigation,
    pub role: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
    /// Sort field, default `createdAt`
    pub sort: Option<String>,
    pub direction: Option<Direction>,
    pub page_size: Option<usize>,
}

impl ViewQuery {
    fn filters(&self) -> FilterSet {
        FilterSet {
            role: self.role.clone(),
            category: self.category.clone(),
            status: self.status.clone(),
            search: self.search.clone(),
        }
    }

    fn sort(&self) -> SortSpec {
        let defaults = SortSpec::default();
        SortSpec {
            field: self.sort.clone().unwrap_or(defaults.field),
            direction: self.direction.unwrap_or(defaults.direction),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ViewPage {
    pub view: View,
    /// Navigation that actually ran; a changed query always restarts at `first`.
    pub navigation: Navigation,
    #[serde(flatten)]
    pub page: CursorPage<TableRow>,
}

#[utoipa::path(
    get,
    path = "/api/v1/views/{view}",
    security(("jwt_token" = [])),
    params(
        ("view" = String, Path, description = "customers, all-users, artists, posts, reports, ratings or admins"),
        ViewQuery,
    ),
    responses(
        (status = 200, description = "One page of the view", body = ViewPage),
        (status = 400, description = "Unknown view, bad filter or no such page", body = AppError),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "dashboard"
)]
pub async fn get_view(
    Extension(store): Extension<SharedStore>,
    Extension(sessions): Extension<SessionRegistry>,
    Extension(config): Extension<DashboardConfig>,
    admin: AdminContext,
    Path(view): Path<String>,
    Query(query): Query<ViewQuery>,
) -> AppResult<impl IntoResponse> {
    let view: View = view.parse()?;
    let page_size = config.page_size(query.page_size).ok_or_else(|| {
        AppError::Validation(format!(
            "page_size must be between 1 and {}",
            config.max_page_size
        ))
    })?;
    let plan = ReadPlan::build(view, &query.filters(), query.sort(), page_size)?;

    let session = sessions
        .get_or_start(&admin.session_id, &admin.id, admin.expires_at)
        .await;
    let batch = {
        let mut session = session.lock().await;
        session
            .view_mut(view)
            .navigate(store.as_ref(), &plan, query.nav)
            .await?
    };

    let rows = render_rows(store.as_ref(), view, &batch.documents).await?;
    let page = CursorPage::new(rows, batch.page, batch.has_more);
    let body = ViewPage {
        view,
        navigation: batch.navigation,
        page,
    };

    if body.page.is_empty() {
        Ok(ApiResponse::with_message(body, format!("No {} found", view.noun())))
    } else {
        Ok(ApiResponse::ok(body))
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/overview",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "KPIs, user growth and posts by category", body = Overview),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "dashboard"
)]
pub async fn get_overview(
    Extension(store): Extension<SharedStore>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
) -> AppResult<impl IntoResponse> {
    let session = sessions
        .get_or_start(&admin.session_id, &admin.id, admin.expires_at)
        .await;
    let categories = session.lock().await.categories();
    let data = overview::overview(store.as_ref(), &categories, chrono::Utc::now()).await?;
    Ok(ApiResponse::ok(data))
}

#[utoipa::path(
    get,
    path = "/api/v1/analytics",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Today's counters, posts by category and reports trend", body = Analytics),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "dashboard"
)]
pub async fn get_analytics(
    Extension(store): Extension<SharedStore>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
) -> AppResult<impl IntoResponse> {
    let session = sessions
        .get_or_start(&admin.session_id, &admin.id, admin.expires_at)
        .await;
    let categories = session.lock().await.categories();
    let data = overview::analytics(store.as_ref(), &categories, chrono::Utc::now()).await?;
    Ok(ApiResponse::ok(data))
}

#[utoipa::path(
    get,
    path = "/api/v1/ratings/top-artists",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Highest rated artists", body = Vec<TopArtist>),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "dashboard"
)]
pub async fn get_top_artists(
    Extension(store): Extension<SharedStore>,
    _admin: AdminContext,
) -> AppResult<impl IntoResponse> {
    let artists = overview::top_artists(store.as_ref(), TOP_ARTISTS).await?;
    if artists.is_empty() {
        return Ok(ApiResponse::with_message(artists, "No ratings yet"));
    }
    Ok(ApiResponse::ok(artists))
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PendingCountResponse {
    pub count: u64,
    /// Whether the value comes from the live subscription.
    pub live: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/reports/pending-count",
    security(("jwt_token" = [])),
    responses(
        (status = 200, description = "Number of pending reports", body = PendingCountResponse),
        (status = 401, description = "Unauthorized", body = AppError),
    ),
    tag = "reports"
)]
pub async fn get_pending_count(
    Extension(store): Extension<SharedStore>,
    Extension(sessions): Extension<SessionRegistry>,
    admin: AdminContext,
) -> AppResult<impl IntoResponse> {
    let session = sessions
        .get_or_start(&admin.session_id, &admin.id, admin.expires_at)
        .await;
    let live = session.lock().await.pending_count();

    let response = match live {
        Some(count) => PendingCountResponse { count, live: true },
        None => PendingCountResponse {
            count: store
                .count(REPORTS, &[FieldFilter::eq("status", "pending")])
                .await?,
            live: false,
        },
    };
    Ok(ApiResponse::ok(response))
}
