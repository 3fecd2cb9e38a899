use chrono::{DateTime, SecondsFormat, Utc};

/// Encode a timestamp for storage.
///
/// Always UTC, always millisecond precision with a `Z` suffix, so every
/// stored value has the same width and SQL string comparison orders them
/// the same way time does.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Decode a stored timestamp. Accepts any RFC 3339 offset.
pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
