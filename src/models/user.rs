use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Customer,
    Artist,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Customer => "customer",
            UserRole::Artist => "artist",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "customer" => Some(UserRole::Customer),
            "artist" => Some(UserRole::Artist),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    #[default]
    Active,
    Suspended,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Suspended => "suspended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "active" => Some(UserStatus::Active),
            "suspended" => Some(UserStatus::Suspended),
            _ => None,
        }
    }
}

/// Marketplace account, customer or artist.
///
/// `role` and `status` keep the stored text so that rows written by other
/// clients (an "admin" role, a status this service does not manage) still
/// decode and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Craft category, artists only.
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub average_rating: Option<f64>,
    #[serde(
        default,
        with = "super::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("N/A")
    }

    pub fn role(&self) -> Option<UserRole> {
        self.role.as_deref().and_then(UserRole::parse)
    }

    /// A missing status reads as active; `None` means an unrecognised value.
    pub fn status(&self) -> Option<UserStatus> {
        match self.status.as_deref() {
            None => Some(UserStatus::Active),
            Some(value) => UserStatus::parse(value),
        }
    }

    pub fn status_label(&self) -> &str {
        self.status.as_deref().unwrap_or(UserStatus::Active.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_role_and_status_still_decode() {
        let user: User = serde_json::from_value(json!({
            "name": "Root",
            "role": "admin",
            "status": "banned",
        }))
        .unwrap();
        assert_eq!(user.role.as_deref(), Some("admin"));
        assert_eq!(user.role(), None);
        assert_eq!(user.status(), None);
        assert_eq!(user.status_label(), "banned");
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let user: User = serde_json::from_value(json!({
            "role": null,
            "status": null,
            "averageRating": null,
        }))
        .unwrap();
        assert_eq!(user.role(), None);
        assert_eq!(user.status(), Some(UserStatus::Active));
        assert_eq!(user.status_label(), "active");
    }

    #[test]
    fn stored_values_parse_case_insensitively() {
        let user: User =
            serde_json::from_value(json!({"role": "Artist", "status": "SUSPENDED"})).unwrap();
        assert_eq!(user.role(), Some(UserRole::Artist));
        assert_eq!(user.status(), Some(UserStatus::Suspended));
    }
}
