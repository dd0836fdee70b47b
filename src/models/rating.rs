use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    #[serde(default, skip_serializing)]
    pub id: String,
    #[serde(default)]
    pub artist_id: Option<String>,
    /// 0 to 5. Missing or null reads as 0.
    #[serde(default)]
    pub stars: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(
        default,
        with = "super::timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

/// Mean of `stars` to one decimal place; "0.0" for no ratings.
pub fn format_average(stars: &[f64]) -> String {
    if stars.is_empty() {
        return "0.0".to_string();
    }
    let total: f64 = stars.iter().sum();
    format!("{:.1}", total / stars.len() as f64)
}

impl Rating {
    pub fn stars(&self) -> f64 {
        self.stars.unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_stars_read_as_zero() {
        let rating: Rating =
            serde_json::from_value(serde_json::json!({"artistId": "a1", "stars": null})).unwrap();
        assert_eq!(rating.stars(), 0.0);
        let rating: Rating = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(rating.stars(), 0.0);
    }

    #[test]
    fn average_of_three() {
        assert_eq!(format_average(&[5.0, 4.0, 3.0]), "4.0");
    }

    #[test]
    fn average_of_nothing() {
        assert_eq!(format_average(&[]), "0.0");
    }

    #[test]
    fn average_rounds_to_one_decimal() {
        assert_eq!(format_average(&[5.0, 4.0]), "4.5");
        assert_eq!(format_average(&[5.0, 5.0, 4.0]), "4.7");
    }
}
