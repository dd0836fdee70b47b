//! KPI counts and chart series for the overview and analytics pages.

use crate::error::AppResult;
use crate::models::{format_average, timestamp, Rating};
use crate::services::category_cache::CategoryCache;
use crate::store::{
    Direction, DocumentStore, FieldFilter, StoreQuery, StoreResult, POSTS, RATINGS, REPORTS,
    USERS,
};
use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use futures_util::future::try_join_all;
use serde::Serialize;
use utoipa::ToSchema;

pub const GROWTH_MONTHS: u32 = 6;
pub const TREND_DAYS: i64 = 7;
pub const TOP_ARTISTS: usize = 10;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OverviewStats {
    pub total_users: u64,
    pub total_artists: u64,
    pub total_posts: u64,
    pub active_posts: u64,
    pub pending_reports: u64,
    /// One decimal place, "0.0" with no ratings.
    pub average_rating: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, ToSchema)]
pub struct ChartSeries {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Overview {
    pub stats: OverviewStats,
    pub user_growth: ChartSeries,
    pub posts_by_category: ChartSeries,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TodayCounts {
    pub posts: u64,
    pub users: u64,
    pub reports: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Analytics {
    pub today: TodayCounts,
    pub posts_by_category: ChartSeries,
    pub reports_trend: ChartSeries,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TopArtist {
    pub id: String,
    pub name: String,
    pub category: String,
    pub average_rating: String,
}

/// A labelled half-open time range `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    fn filters(&self) -> Vec<FieldFilter> {
        vec![
            FieldFilter::gte("createdAt", timestamp::format(&self.start)),
            FieldFilter::lt("createdAt", timestamp::format(&self.end)),
        ]
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).unwrap_or_default())
}

fn month_start(year: i32, month0: i32) -> DateTime<Utc> {
    let year = year + month0.div_euclid(12);
    let month = month0.rem_euclid(12) as u32 + 1;
    let date = NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MIN);
    midnight(date)
}

/// The last `count` calendar months ending with the one containing `now`,
/// oldest first, labelled like "Mar 2025".
pub fn month_windows(now: DateTime<Utc>, count: u32) -> Vec<Window> {
    let current = now.month0() as i32;
    (0..count as i32)
        .rev()
        .map(|back| {
            let start = month_start(now.year(), current - back);
            let end = month_start(now.year(), current - back + 1);
            Window {
                label: start.format("%b %Y").to_string(),
                start,
                end,
            }
        })
        .collect()
}

/// The last `count` days ending today, oldest first, labelled like "Mar 1".
pub fn day_windows(now: DateTime<Utc>, count: i64) -> Vec<Window> {
    let today = midnight(now.date_naive());
    (0..count)
        .rev()
        .map(|back| {
            let start = today - Duration::days(back);
            Window {
                label: start.format("%b %-d").to_string(),
                start,
                end: start + Duration::days(1),
            }
        })
        .collect()
}

async fn count_windows(
    store: &dyn DocumentStore,
    collection: &str,
    windows: Vec<Window>,
) -> StoreResult<ChartSeries> {
    let counts = try_join_all(
        windows
            .iter()
            .map(|w| async move { store.count(collection, &w.filters()).await }),
    )
    .await?;
    Ok(ChartSeries {
        labels: windows.into_iter().map(|w| w.label).collect(),
        values: counts,
    })
}

async fn average_rating(store: &dyn DocumentStore) -> StoreResult<String> {
    let ratings = store.query(&StoreQuery::collection(RATINGS)).await?;
    let stars = ratings
        .iter()
        .map(|doc| doc.decode::<Rating>().map(|r| r.stars()))
        .collect::<StoreResult<Vec<f64>>>()?;
    Ok(format_average(&stars))
}

pub async fn stats(store: &dyn DocumentStore) -> StoreResult<OverviewStats> {
    let artists = [FieldFilter::eq("role", "artist")];
    let active = [FieldFilter::eq("status", "active")];
    let pending = [FieldFilter::eq("status", "pending")];

    let (total_users, total_artists, total_posts, active_posts, pending_reports, average_rating) =
        futures_util::try_join!(
            store.count(USERS, &[]),
            store.count(USERS, &artists),
            store.count(POSTS, &[]),
            store.count(POSTS, &active),
            store.count(REPORTS, &pending),
            average_rating(store),
        )?;

    Ok(OverviewStats {
        total_users,
        total_artists,
        total_posts,
        active_posts,
        pending_reports,
        average_rating,
    })
}

pub async fn overview(
    store: &dyn DocumentStore,
    categories: &CategoryCache,
    now: DateTime<Utc>,
) -> AppResult<Overview> {
    let (stats, user_growth, snapshot) = futures_util::try_join!(
        stats(store),
        count_windows(store, USERS, month_windows(now, GROWTH_MONTHS)),
        categories.get_or_refresh(store),
    )?;
    let (labels, values) = snapshot.labels_and_values();

    Ok(Overview {
        stats,
        user_growth,
        posts_by_category: ChartSeries { labels, values },
    })
}

pub async fn analytics(
    store: &dyn DocumentStore,
    categories: &CategoryCache,
    now: DateTime<Utc>,
) -> AppResult<Analytics> {
    let since_midnight = vec![FieldFilter::gte(
        "createdAt",
        timestamp::format(&midnight(now.date_naive())),
    )];

    let (posts, users, reports, reports_trend, snapshot) = futures_util::try_join!(
        store.count(POSTS, &since_midnight),
        store.count(USERS, &since_midnight),
        store.count(REPORTS, &since_midnight),
        count_windows(store, REPORTS, day_windows(now, TREND_DAYS)),
        categories.get_or_refresh(store),
    )?;
    let (labels, values) = snapshot.labels_and_values();

    Ok(Analytics {
        today: TodayCounts {
            posts,
            users,
            reports,
        },
        posts_by_category: ChartSeries { labels, values },
        reports_trend,
    })
}

/// Highest-rated artists first.
pub async fn top_artists(store: &dyn DocumentStore, limit: usize) -> AppResult<Vec<TopArtist>> {
    let query = StoreQuery::collection(USERS)
        .filter(FieldFilter::eq("role", "artist"))
        .order_by("averageRating", Direction::Desc)
        .limit(limit);
    let docs = store.query(&query).await?;

    Ok(docs
        .iter()
        .map(|doc| TopArtist {
            id: doc.id.clone(),
            name: doc.str_field("name").unwrap_or("N/A").to_string(),
            category: doc.str_field("category").unwrap_or("N/A").to_string(),
            average_rating: doc
                .field("averageRating")
                .and_then(|v| v.as_f64())
                .map(|r| format!("{r:.1}"))
                .unwrap_or_else(|| "N/A".to_string()),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn at(raw: &str) -> DateTime<Utc> {
        timestamp::parse(raw).unwrap()
    }

    #[test]
    fn month_windows_cross_the_year_boundary() {
        let windows = month_windows(at("2025-02-14T09:00:00.000Z"), 6);
        let labels: Vec<_> = windows.iter().map(|w| w.label.as_str()).collect();
        assert_eq!(
            labels,
            vec!["Sep 2024", "Oct 2024", "Nov 2024", "Dec 2024", "Jan 2025", "Feb 2025"]
        );
        assert_eq!(windows[3].start, at("2024-12-01T00:00:00.000Z"));
        assert_eq!(windows[3].end, at("2025-01-01T00:00:00.000Z"));
    }

    #[test]
    fn day_windows_are_half_open() {
        let windows = day_windows(at("2025-03-03T18:30:00.000Z"), 7);
        assert_eq!(windows.len(), 7);
        assert_eq!(windows[0].label, "Feb 25");
        assert_eq!(windows[6].label, "Mar 3");
        assert_eq!(windows[6].start, at("2025-03-03T00:00:00.000Z"));
        assert_eq!(windows[5].end, windows[6].start);
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        let users = [
            ("u1", "customer", "2025-01-10T00:00:00.000Z", None),
            ("u2", "artist", "2025-03-02T00:00:00.000Z", Some(4.5)),
            ("u3", "artist", "2025-03-03T08:00:00.000Z", Some(3.0)),
        ];
        for (id, role, created, rating) in users {
            let mut data = json!({"name": id, "role": role, "createdAt": created});
            if let Some(r) = rating {
                data["averageRating"] = json!(r);
            }
            store.set(USERS, id, data).await.unwrap();
        }
        store
            .set(POSTS, "p1", json!({"status": "active", "category": "Wood", "createdAt": "2025-03-03T01:00:00.000Z"}))
            .await
            .unwrap();
        store
            .set(POSTS, "p2", json!({"status": "removed", "createdAt": "2025-02-01T00:00:00.000Z"}))
            .await
            .unwrap();
        for (id, created, status) in [
            ("r1", "2025-03-03T02:00:00.000Z", "pending"),
            ("r2", "2025-03-02T23:59:59.999Z", "reviewed"),
            ("r3", "2025-03-01T12:00:00.000Z", "pending"),
        ] {
            store
                .set(REPORTS, id, json!({"status": status, "createdAt": created}))
                .await
                .unwrap();
        }
        for (id, stars) in [("s1", 5), ("s2", 4), ("s3", 3)] {
            store.set(RATINGS, id, json!({"stars": stars})).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn overview_counts_and_charts() {
        let store = seeded().await;
        let cache = CategoryCache::new(std::time::Duration::from_secs(60));
        let overview = overview(&store, &cache, at("2025-03-03T18:00:00.000Z"))
            .await
            .unwrap();

        assert_eq!(overview.stats.total_users, 3);
        assert_eq!(overview.stats.total_artists, 2);
        assert_eq!(overview.stats.total_posts, 2);
        assert_eq!(overview.stats.active_posts, 1);
        assert_eq!(overview.stats.pending_reports, 2);
        assert_eq!(overview.stats.average_rating, "4.0");
        assert_eq!(overview.user_growth.values, vec![0, 0, 0, 1, 0, 2]);
        assert_eq!(overview.posts_by_category.labels, vec!["Unknown", "Wood"]);
    }

    #[tokio::test]
    async fn analytics_today_and_trend() {
        let store = seeded().await;
        let cache = CategoryCache::new(std::time::Duration::from_secs(60));
        let analytics = analytics(&store, &cache, at("2025-03-03T18:00:00.000Z"))
            .await
            .unwrap();

        assert_eq!(analytics.today.posts, 1);
        assert_eq!(analytics.today.users, 1);
        assert_eq!(analytics.today.reports, 1);
        assert_eq!(analytics.reports_trend.values, vec![0, 0, 0, 0, 1, 1, 1]);
    }

    #[tokio::test]
    async fn top_artists_by_rating() {
        let store = seeded().await;
        let top = top_artists(&store, TOP_ARTISTS).await.unwrap();
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].id, "u2");
        assert_eq!(top[0].average_rating, "4.5");
        assert_eq!(top[1].category, "N/A");
    }

    #[tokio::test]
    async fn empty_store_averages_to_zero() {
        let store = MemoryStore::new();
        assert_eq!(stats(&store).await.unwrap().average_rating, "0.0");
    }
}
