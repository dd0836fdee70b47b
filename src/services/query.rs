//! Read planning for the list views.
//!
//! A [`ReadPlan`] splits a view's filters into the single equality condition
//! the store evaluates and the remainder that is applied to an over-fetched
//! batch in process.

use crate::error::{AppError, AppResult};
use crate::store::{
    self, Bound, Direction, Document, FieldFilter, StoreQuery,
};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;
use utoipa::ToSchema;

/// Over-fetch multiplier used whenever a filter runs client-side.
pub const OVER_FETCH_FACTOR: usize = 5;

/// One administrative page. The first seven are paginated tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum View {
    Customers,
    AllUsers,
    Artists,
    Posts,
    Reports,
    Ratings,
    Admins,
    Overview,
    Analytics,
}

impl View {
    pub const TABLES: [View; 7] = [
        View::Customers,
        View::AllUsers,
        View::Artists,
        View::Posts,
        View::Reports,
        View::Ratings,
        View::Admins,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            View::Customers => "customers",
            View::AllUsers => "all-users",
            View::Artists => "artists",
            View::Posts => "posts",
            View::Reports => "reports",
            View::Ratings => "ratings",
            View::Admins => "admins",
            View::Overview => "overview",
            View::Analytics => "analytics",
        }
    }

    pub fn is_table(&self) -> bool {
        !matches!(self, View::Overview | View::Analytics)
    }

    pub fn is_user_view(&self) -> bool {
        matches!(self, View::Customers | View::AllUsers | View::Artists)
    }

    pub fn collection(&self) -> Option<&'static str> {
        match self {
            View::Customers | View::AllUsers | View::Artists => Some(store::USERS),
            View::Posts => Some(store::POSTS),
            View::Reports => Some(store::REPORTS),
            View::Ratings => Some(store::RATINGS),
            View::Admins => Some(store::ADMINS),
            View::Overview | View::Analytics => None,
        }
    }

    /// Condition every query of this view carries.
    pub fn base_filter(&self) -> Option<FieldFilter> {
        match self {
            View::Customers => Some(FieldFilter::eq("role", "customer")),
            View::Artists => Some(FieldFilter::eq("role", "artist")),
            _ => None,
        }
    }

    pub fn sort_fields(&self) -> &'static [&'static str] {
        match self {
            View::Customers | View::AllUsers | View::Artists => {
                &["createdAt", "averageRating", "name"]
            }
            View::Ratings => &["createdAt", "stars"],
            _ => &["createdAt"],
        }
    }

    pub fn search_fields(&self) -> &'static [&'static str] {
        match self {
            View::Customers | View::AllUsers | View::Artists => &["name", "email"],
            View::Posts => &["artistName"],
            View::Reports => &["reason"],
            View::Ratings => &["feedback"],
            View::Admins => &["email"],
            View::Overview | View::Analytics => &[],
        }
    }

    fn allowed_roles(&self) -> Option<&'static [&'static str]> {
        match self {
            View::AllUsers => Some(&["customer", "artist"]),
            _ => None,
        }
    }

    fn allowed_statuses(&self) -> Option<&'static [&'static str]> {
        match self {
            View::Customers | View::AllUsers | View::Artists => Some(&["active", "suspended"]),
            View::Posts => Some(&["active", "removed"]),
            View::Reports => Some(&["pending", "reviewed"]),
            _ => None,
        }
    }

    fn accepts_category(&self) -> bool {
        matches!(self, View::Artists | View::Posts)
    }

    /// Heading used for the "none found" page.
    pub fn noun(&self) -> &'static str {
        match self {
            View::Customers => "customers",
            View::AllUsers => "users",
            View::Artists => "artists",
            View::Posts => "posts",
            View::Reports => "reports",
            View::Ratings => "ratings",
            View::Admins => "admins",
            View::Overview | View::Analytics => "records",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = AppError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        View::TABLES
            .iter()
            .chain([View::Overview, View::Analytics].iter())
            .copied()
            .find(|v| v.as_str() == raw)
            .ok_or_else(|| AppError::Validation(format!("Unknown view '{raw}'")))
    }
}

/// User-selected filters. Empty strings and "all" mean no filter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Deserialize, ToSchema)]
pub struct FilterSet {
    pub role: Option<String>,
    pub category: Option<String>,
    pub status: Option<String>,
    pub search: Option<String>,
}

fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("all"))
        .map(str::to_string)
}

impl FilterSet {
    pub fn normalized(&self) -> Self {
        Self {
            role: normalize(self.role.as_deref()).map(|r| r.to_ascii_lowercase()),
            category: normalize(self.category.as_deref()),
            status: normalize(self.status.as_deref()).map(|s| s.to_ascii_lowercase()),
            search: self
                .search
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortSpec {
    pub field: String,
    pub direction: Direction,
}

impl Default for SortSpec {
    fn default() -> Self {
        Self {
            field: "createdAt".to_string(),
            direction: Direction::Desc,
        }
    }
}

/// A filter evaluated in process after the store read.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientFilter {
    Equals { field: String, value: String },
    Search { fields: Vec<String>, needle: String },
}

impl ClientFilter {
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            ClientFilter::Equals { field, value } => doc.str_field(field) == Some(value.as_str()),
            ClientFilter::Search { fields, needle } => fields.iter().any(|field| {
                doc.str_field(field)
                    .map(|text| text.to_lowercase().contains(needle))
                    .unwrap_or(false)
            }),
        }
    }
}

/// Everything needed to read one page of a view.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPlan {
    pub view: View,
    pub server_filter: Option<FieldFilter>,
    pub client_filters: Vec<ClientFilter>,
    pub sort: SortSpec,
    pub page_size: usize,
    /// Fingerprint of view, filters, sort and page size.
    pub shape: u64,
}

impl ReadPlan {
    pub fn build(
        view: View,
        filters: &FilterSet,
        sort: SortSpec,
        page_size: usize,
    ) -> AppResult<Self> {
        if !view.is_table() {
            return Err(AppError::Validation(format!("'{view}' is not a table view")));
        }
        if page_size == 0 {
            return Err(AppError::Validation("page_size must be at least 1".to_string()));
        }
        if !view.sort_fields().contains(&sort.field.as_str()) {
            return Err(AppError::Validation(format!(
                "Cannot sort {} by '{}'",
                view, sort.field
            )));
        }

        let filters = filters.normalized();
        let mut equalities: Vec<(&'static str, String)> = Vec::new();

        if let Some(role) = &filters.role {
            match view.allowed_roles() {
                Some(allowed) if allowed.contains(&role.as_str()) => {
                    equalities.push(("role", role.clone()))
                }
                Some(_) => return Err(AppError::Validation(format!("Unknown role '{role}'"))),
                None => {
                    return Err(AppError::Validation(format!(
                        "The {view} view has no role filter"
                    )))
                }
            }
        }
        if let Some(status) = &filters.status {
            match view.allowed_statuses() {
                Some(allowed) if allowed.contains(&status.as_str()) => {
                    equalities.push(("status", status.clone()))
                }
                Some(_) => {
                    return Err(AppError::Validation(format!("Unknown status '{status}'")))
                }
                None => {
                    return Err(AppError::Validation(format!(
                        "The {view} view has no status filter"
                    )))
                }
            }
        }
        if let Some(category) = &filters.category {
            if !view.accepts_category() {
                return Err(AppError::Validation(format!(
                    "The {view} view has no category filter"
                )));
            }
            equalities.push(("category", category.clone()));
        }

        // The store evaluates one equality: the view's own, else the first
        // supplied in role, status, category order.
        let mut remaining = equalities.into_iter();
        let server_filter = match view.base_filter() {
            Some(base) => Some(base),
            None => remaining
                .next()
                .map(|(field, value)| FieldFilter::eq(field, value)),
        };

        let mut client_filters: Vec<ClientFilter> = remaining
            .map(|(field, value)| ClientFilter::Equals {
                field: field.to_string(),
                value,
            })
            .collect();
        if let Some(search) = &filters.search {
            client_filters.push(ClientFilter::Search {
                fields: view.search_fields().iter().map(|f| f.to_string()).collect(),
                needle: search.to_lowercase(),
            });
        }

        let mut hasher = DefaultHasher::new();
        view.hash(&mut hasher);
        filters.hash(&mut hasher);
        sort.hash(&mut hasher);
        page_size.hash(&mut hasher);

        Ok(Self {
            view,
            server_filter,
            client_filters,
            sort,
            page_size,
            shape: hasher.finish(),
        })
    }

    pub fn has_client_filters(&self) -> bool {
        !self.client_filters.is_empty()
    }

    /// Rows requested from the store for one page.
    pub fn fetch_limit(&self) -> usize {
        if self.has_client_filters() {
            self.page_size * OVER_FETCH_FACTOR + 1
        } else {
            self.page_size + 1
        }
    }

    pub fn store_query(&self, bound: Option<Bound>) -> StoreQuery {
        let collection = self.view.collection().unwrap_or(store::USERS);
        let mut query = StoreQuery::collection(collection)
            .order_by(&self.sort.field, self.sort.direction)
            .limit(self.fetch_limit());
        if let Some(filter) = &self.server_filter {
            query = query.filter(filter.clone());
        }
        query.bound = bound;
        query.shape = self.shape;
        query
    }

    pub fn apply_client_filters(&self, docs: Vec<Document>) -> Vec<Document> {
        docs.into_iter()
            .filter(|doc| self.client_filters.iter().all(|f| f.matches(doc)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn filters(role: Option<&str>, category: Option<&str>, status: Option<&str>) -> FilterSet {
        FilterSet {
            role: role.map(String::from),
            category: category.map(String::from),
            status: status.map(String::from),
            search: None,
        }
    }

    #[test]
    fn base_filter_wins_and_others_go_client_side() {
        let plan = ReadPlan::build(
            View::Artists,
            &filters(None, Some("Pottery"), Some("active")),
            SortSpec::default(),
            10,
        )
        .unwrap();
        assert_eq!(plan.server_filter, Some(FieldFilter::eq("role", "artist")));
        assert_eq!(plan.client_filters.len(), 2);
        assert_eq!(plan.fetch_limit(), 51);
    }

    #[test]
    fn role_outranks_status_without_a_base_filter() {
        let plan = ReadPlan::build(
            View::AllUsers,
            &filters(Some("artist"), None, Some("suspended")),
            SortSpec::default(),
            10,
        )
        .unwrap();
        assert_eq!(plan.server_filter, Some(FieldFilter::eq("role", "artist")));
        assert_eq!(
            plan.client_filters,
            vec![ClientFilter::Equals {
                field: "status".to_string(),
                value: "suspended".to_string()
            }]
        );
    }

    #[test]
    fn single_filter_needs_no_over_fetch() {
        let plan = ReadPlan::build(
            View::Posts,
            &filters(None, Some("Textiles"), None),
            SortSpec::default(),
            10,
        )
        .unwrap();
        assert_eq!(plan.server_filter, Some(FieldFilter::eq("category", "Textiles")));
        assert!(!plan.has_client_filters());
        assert_eq!(plan.fetch_limit(), 11);
    }

    #[test]
    fn all_and_blank_mean_unfiltered() {
        let plan = ReadPlan::build(
            View::Reports,
            &FilterSet {
                status: Some("all".to_string()),
                search: Some("   ".to_string()),
                ..FilterSet::default()
            },
            SortSpec::default(),
            10,
        )
        .unwrap();
        assert_eq!(plan.server_filter, None);
        assert!(!plan.has_client_filters());
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let plan = ReadPlan::build(
            View::AllUsers,
            &FilterSet {
                search: Some("ANA".to_string()),
                ..FilterSet::default()
            },
            SortSpec::default(),
            10,
        )
        .unwrap();
        let by_name = Document::new("1", json!({"name": "Joanna", "email": "j@x.com"}));
        let by_email = Document::new("2", json!({"name": "Bo", "email": "ana@x.com"}));
        let neither = Document::new("3", json!({"name": "Bo", "email": "bo@x.com"}));
        let kept = plan.apply_client_filters(vec![by_name, by_email, neither]);
        assert_eq!(
            kept.iter().map(|d| d.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "2"]
        );
    }

    #[test]
    fn shape_changes_with_filters_and_sort() {
        let a = ReadPlan::build(View::Posts, &FilterSet::default(), SortSpec::default(), 10)
            .unwrap();
        let b = ReadPlan::build(
            View::Posts,
            &filters(None, Some("Wood"), None),
            SortSpec::default(),
            10,
        )
        .unwrap();
        let c = ReadPlan::build(
            View::Posts,
            &FilterSet::default(),
            SortSpec {
                field: "createdAt".to_string(),
                direction: Direction::Asc,
            },
            10,
        )
        .unwrap();
        let again = ReadPlan::build(View::Posts, &FilterSet::default(), SortSpec::default(), 10)
            .unwrap();
        assert_ne!(a.shape, b.shape);
        assert_ne!(a.shape, c.shape);
        assert_eq!(a.shape, again.shape);
    }

    #[test]
    fn unsupported_sort_and_filters_are_rejected() {
        let sort = SortSpec {
            field: "stars".to_string(),
            direction: Direction::Desc,
        };
        assert!(ReadPlan::build(View::Posts, &FilterSet::default(), sort, 10).is_err());
        assert!(
            ReadPlan::build(View::Ratings, &filters(None, None, Some("active")), SortSpec::default(), 10)
                .is_err()
        );
        assert!(
            ReadPlan::build(View::Customers, &filters(Some("artist"), None, None), SortSpec::default(), 10)
                .is_err()
        );
        assert!(ReadPlan::build(View::Overview, &FilterSet::default(), SortSpec::default(), 10)
            .is_err());
    }

    #[test]
    fn view_names_round_trip() {
        for view in View::TABLES {
            assert_eq!(view.as_str().parse::<View>().unwrap(), view);
        }
        assert!("forums".parse::<View>().is_err());
    }
}
