//! Flexible date parsing shared by the mapping builder (date format string)
//! and the document builder (numeric duplication of date properties).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// The ES multi-format date pattern accepted by date-typed property fields,
/// joined with `||` the way Elasticsearch expects in a mapping.
pub const DATE_FORMATS: &[&str] = &[
    "yyyy-MM-dd'T'HH",
    "yyyy-MM-dd'T'HH:mm",
    "yyyy-MM-dd'T'HH:mm:ss",
    "yyyy-MM-dd",
    "yyyy-MM",
    "yyyy",
    "strict_date_optional_time",
];

pub fn date_format_pattern() -> String {
    DATE_FORMATS.join("||")
}

/// Parses an FtM date string (truncated ISO 8601 at any of the accepted
/// granularities) into a UTC instant, for `numeric.<field>` duplication.
pub fn parse_flexible_date(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let formats = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%dT%H"];
    for fmt in formats {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid")));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid")));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&format!("{s}-01-01"), "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0).expect("midnight is valid")));
    }
    None
}
