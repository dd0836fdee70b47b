//! Display rows for the list views.

use crate::error::AppResult;
use crate::models::{timestamp, Admin, Post, Rating, Report, User};
use crate::services::query::View;
use crate::store::{self, Document, DocumentStore};
use futures_util::future::join_all;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use utoipa::ToSchema;

pub const DESCRIPTION_LIMIT: usize = 40;
pub const FEEDBACK_LIMIT: usize = 30;
pub const ID_LIMIT: usize = 8;

const UNKNOWN: &str = "Unknown";
const NOT_AVAILABLE: &str = "N/A";

/// Shorten for display, appending "..." when anything was cut.
pub fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => format!("{}...", &text[..byte_idx]),
        None => text.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserRow {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_rating: Option<String>,
    pub joined: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PostRow {
    pub id: String,
    pub short_id: String,
    pub artist_name: String,
    pub category: String,
    pub description: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub created: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportRow {
    pub id: String,
    pub short_id: String,
    pub post_id: String,
    pub post_description: String,
    pub post_artist: String,
    pub reporter: String,
    pub reason: String,
    pub status: String,
    pub created: String,
    pub pending: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RatingRow {
    pub id: String,
    pub artist: String,
    pub stars: String,
    pub feedback: String,
    pub created: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminRow {
    pub id: String,
    pub email: String,
    pub role: String,
    pub created: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum TableRow {
    User(UserRow),
    Post(PostRow),
    Report(ReportRow),
    Rating(RatingRow),
    Admin(AdminRow),
}

/// Turn one page of documents into rows, resolving cross references with
/// one concurrent lookup per distinct id.
pub async fn render_rows(
    store: &dyn DocumentStore,
    view: View,
    docs: &[Document],
) -> AppResult<Vec<TableRow>> {
    let rows = match view {
        View::Customers | View::AllUsers | View::Artists => docs
            .iter()
            .map(|doc| Ok(TableRow::User(user_row(&doc.decode::<User>()?))))
            .collect::<AppResult<Vec<_>>>()?,
        View::Posts => docs
            .iter()
            .map(|doc| Ok(TableRow::Post(post_row(&doc.decode::<Post>()?))))
            .collect::<AppResult<Vec<_>>>()?,
        View::Reports => report_rows(store, docs).await?,
        View::Ratings => rating_rows(store, docs).await?,
        View::Admins => docs
            .iter()
            .map(|doc| Ok(TableRow::Admin(admin_row(&doc.decode::<Admin>()?))))
            .collect::<AppResult<Vec<_>>>()?,
        View::Overview | View::Analytics => Vec::new(),
    };
    Ok(rows)
}

fn user_row(user: &User) -> UserRow {
    let is_artist = user.role() == Some(crate::models::UserRole::Artist);
    UserRow {
        id: user.id.clone(),
        name: user.display_name().to_string(),
        email: user.email.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        role: user
            .role
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        status: user.status_label().to_string(),
        category: is_artist.then(|| {
            user.category
                .clone()
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        }),
        average_rating: is_artist.then(|| {
            user.average_rating
                .map(|rating| format!("{rating:.1}"))
                .unwrap_or_else(|| NOT_AVAILABLE.to_string())
        }),
        joined: timestamp::display_date(user.created_at.as_ref()),
    }
}

fn post_row(post: &Post) -> PostRow {
    PostRow {
        id: post.id.clone(),
        short_id: truncate(&post.id, ID_LIMIT),
        artist_name: post
            .artist_name
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_string()),
        category: post
            .category
            .clone()
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        description: post
            .description
            .as_deref()
            .map(|d| truncate(d, DESCRIPTION_LIMIT))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        status: post.status.as_str().to_string(),
        image_url: post.image_url.clone(),
        created: timestamp::display_date(post.created_at.as_ref()),
    }
}

fn admin_row(admin: &Admin) -> AdminRow {
    AdminRow {
        id: admin.id.clone(),
        email: admin.email.clone(),
        role: admin.role.as_str().to_string(),
        created: timestamp::display_date(admin.created_at.as_ref()),
    }
}

/// Fetch each distinct id once, concurrently. Missing documents and failed
/// lookups are simply absent from the result.
pub async fn lookup_distinct<'a>(
    store: &dyn DocumentStore,
    collection: &str,
    ids: impl IntoIterator<Item = &'a str>,
) -> HashMap<String, Document> {
    let distinct: BTreeSet<&str> = ids.into_iter().filter(|id| !id.is_empty()).collect();

    let lookups = distinct.into_iter().map(|id| async move {
        match store.get(collection, id).await {
            Ok(found) => found,
            Err(e) => {
                tracing::warn!("Lookup of {}/{} failed: {}", collection, id, e);
                None
            }
        }
    });

    join_all(lookups)
        .await
        .into_iter()
        .flatten()
        .map(|doc| (doc.id.clone(), doc))
        .collect()
}

async fn report_rows(store: &dyn DocumentStore, docs: &[Document]) -> AppResult<Vec<TableRow>> {
    let reports = docs
        .iter()
        .map(|doc| doc.decode::<Report>())
        .collect::<Result<Vec<_>, _>>()?;

    let (posts, reporters) = futures_util::join!(
        lookup_distinct(
            store,
            store::POSTS,
            reports.iter().filter_map(|r| r.post_id.as_deref()),
        ),
        lookup_distinct(
            store,
            store::USERS,
            reports.iter().filter_map(|r| r.reporter_id.as_deref()),
        ),
    );

    Ok(reports
        .iter()
        .map(|report| {
            let post = report.post_id.as_deref().and_then(|id| posts.get(id));
            let reporter = report.reporter_id.as_deref().and_then(|id| reporters.get(id));
            TableRow::Report(ReportRow {
                id: report.id.clone(),
                short_id: truncate(&report.id, ID_LIMIT),
                post_id: report
                    .post_id
                    .as_deref()
                    .map(|id| truncate(id, ID_LIMIT))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                post_description: post
                    .and_then(|p| p.str_field("description"))
                    .map(|d| truncate(d, DESCRIPTION_LIMIT))
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
                post_artist: post
                    .and_then(|p| p.str_field("artistName"))
                    .unwrap_or(UNKNOWN)
                    .to_string(),
                reporter: reporter
                    .and_then(|u| u.str_field("name"))
                    .unwrap_or(UNKNOWN)
                    .to_string(),
                reason: report
                    .reason
                    .clone()
                    .unwrap_or_else(|| "No reason".to_string()),
                status: report.status.as_str().to_string(),
                created: timestamp::display_date(report.created_at.as_ref()),
                pending: report.is_pending(),
            })
        })
        .collect())
}

async fn rating_rows(store: &dyn DocumentStore, docs: &[Document]) -> AppResult<Vec<TableRow>> {
    let ratings = docs
        .iter()
        .map(|doc| doc.decode::<Rating>())
        .collect::<Result<Vec<_>, _>>()?;

    let artists = lookup_distinct(
        store,
        store::USERS,
        ratings.iter().filter_map(|r| r.artist_id.as_deref()),
    )
    .await;

    Ok(ratings
        .iter()
        .map(|rating| {
            let artist = rating
                .artist_id
                .as_deref()
                .and_then(|id| artists.get(id))
                .and_then(|a| a.str_field("name"))
                .unwrap_or(UNKNOWN);
            TableRow::Rating(RatingRow {
                id: rating.id.clone(),
                artist: artist.to_string(),
                stars: format!("{:.1}", rating.stars()),
                feedback: rating
                    .feedback
                    .as_deref()
                    .map(|f| truncate(f, FEEDBACK_LIMIT))
                    .unwrap_or_else(|| "No feedback".to_string()),
                created: timestamp::display_date(rating.created_at.as_ref()),
            })
        })
        .collect())
}
