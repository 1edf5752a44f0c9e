use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Parses the timestamp shapes stored in item rows: harvested
/// `YYYY-MM-DD HH:MM:SS`, RFC 3339, or a bare authored `YYYY-MM-DD`
/// (read as midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// RFC 822 style date for RSS, or `None` if `value` is not a timestamp.
pub fn to_rfc822(value: &str) -> Option<String> {
    parse_timestamp(value).map(|dt| dt.to_rfc2822())
}
