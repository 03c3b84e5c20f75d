use chrono::{NaiveDateTime, ParseResult};

/// Wire and storage format for range boundaries (second precision, no zone).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn parse_timestamp(raw: &str) -> ParseResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT)
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_round_trips_at_second_precision() {
        let ts = parse_timestamp("2024-01-05 23:59:59").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-05 23:59:59");
    }

    #[test]
    fn iso_separator_is_rejected() {
        assert!(parse_timestamp("2024-01-05T00:00:00").is_err());
    }
}
