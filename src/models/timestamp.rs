//! Document timestamps.
//!
//! Stored as RFC 3339 UTC strings with exactly three fractional digits, so
//! comparing the strings compares the instants.

use chrono::{DateTime, SecondsFormat, Utc};

pub fn format(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now() -> String {
    format(&Utc::now())
}

pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Date part shown in tables, or "N/A".
pub fn display_date(dt: Option<&DateTime<Utc>>) -> String {
    dt.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

/// Serde adapter for `Option<DateTime<Utc>>` fields. Unparsable values
/// read as `None`.
pub mod option {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(dt) => serializer.serialize_str(&super::format(dt)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(raw.as_deref().and_then(super::parse))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fixed_width_keeps_lexical_order() {
        let whole = Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0).unwrap();
        let later = whole + chrono::Duration::milliseconds(500);
        let (a, b) = (format(&whole), format(&later));
        assert_eq!(a, "2025-03-01T10:00:00.000Z");
        assert!(a < b);
    }

    #[test]
    fn parse_accepts_offsets() {
        let dt = parse("2025-03-01T12:00:00+02:00").unwrap();
        assert_eq!(format(&dt), "2025-03-01T10:00:00.000Z");
        assert!(parse("yesterday").is_none());
    }

    #[test]
    fn missing_date_displays_na() {
        assert_eq!(display_date(None), "N/A");
        let dt = Utc.with_ymd_and_hms(2024, 12, 31, 23, 0, 0).unwrap();
        assert_eq!(display_date(Some(&dt)), "2024-12-31");
    }
}
