//! ISO 8601 conversion for epoch-millisecond timestamps.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Render epoch milliseconds as `YYYY-MM-DDTHH:MM:SS.mmmZ`.
///
/// Negative or out-of-range timestamps give `None`.
pub fn iso8601(timestamp_ms: i64) -> Option<String> {
    if timestamp_ms < 0 {
        return None;
    }
    let datetime = OffsetDateTime::from_unix_timestamp_nanos(timestamp_ms as i128 * 1_000_000).ok()?;
    let format = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z"
    );
    datetime.format(format).ok()
}

/// Parse an ISO 8601 / RFC 3339 string into epoch milliseconds.
///
/// Also accepts a space instead of `T` and a missing zone (read as UTC).
pub fn parse8601(text: &str) -> Option<i64> {
    let text = text.trim();
    if text.len() < 19 {
        return None;
    }
    let mut normalized = text.replacen(' ', "T", 1);
    let has_zone = normalized.ends_with(['Z', 'z'])
        || normalized.get(19..).is_some_and(|tail| tail.contains(['+', '-']));
    if !has_zone {
        normalized.push('Z');
    }
    let datetime = OffsetDateTime::parse(&normalized, &Rfc3339).ok()?;
    let millis = datetime.to_offset(UtcOffset::UTC).unix_timestamp_nanos() / 1_000_000;
    i64::try_from(millis).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iso8601() {
        assert_eq!(iso8601(0).as_deref(), Some("1970-01-01T00:00:00.000Z"));
        assert_eq!(
            iso8601(1_700_000_000_123).as_deref(),
            Some("2023-11-14T22:13:20.123Z")
        );
        assert_eq!(iso8601(-1), None);
    }

    #[test]
    fn test_parse8601() {
        assert_eq!(parse8601("2023-11-14T22:13:20.123Z"), Some(1_700_000_000_123));
        assert_eq!(parse8601("2023-11-14 22:13:20"), Some(1_700_000_000_000));
        assert_eq!(parse8601("2023-11-15T00:13:20+02:00"), Some(1_700_000_000_000));
        assert_eq!(parse8601("yesterday"), None);
        assert_eq!(parse8601(""), None);
    }

    #[test]
    fn test_round_trip() {
        let ts = 1_650_000_000_999;
        assert_eq!(parse8601(&iso8601(ts).unwrap()), Some(ts));
    }
}
