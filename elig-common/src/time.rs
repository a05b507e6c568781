//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time as RFC 3339 with second precision and a `Z` suffix
///
/// Used for `ingested_at`, `cleaned_at` and manifest timestamps.
pub fn utc_now_iso() -> String {
    to_iso_seconds(now())
}

/// Render a timestamp as RFC 3339, seconds precision, `Z` suffix
pub fn to_iso_seconds(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800);
    }

    #[test]
    fn test_iso_seconds_format() {
        let ts = Utc.with_ymd_and_hms(2025, 12, 31, 17, 6, 15).unwrap();
        assert_eq!(to_iso_seconds(ts), "2025-12-31T17:06:15Z");
    }

    #[test]
    fn test_utc_now_iso_has_no_fraction() {
        let iso = utc_now_iso();
        assert!(iso.ends_with('Z'));
        assert!(!iso.contains('.'), "unexpected sub-second precision: {}", iso);
        assert_eq!(iso.len(), "2025-12-31T17:06:15Z".len());
    }
}
