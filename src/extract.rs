/// Access-log line extraction: pull the account id and request time out of
/// one Apache combined-style line.
///
/// The account id is the third `/segment` after the bracketed timestamp, e.g.
/// `"GET /api/v2/0a9f3c21/orders HTTP/1.1"` yields `0a9f3c21`. Short segments
/// are treated as ordinary path words rather than ids.
use chrono::DateTime;
use regex::Regex;
use std::sync::LazyLock;

/// Layout of the bracketed timestamp, e.g. `10/Oct/2000:13:55:36 -0700`.
const LOG_TIME_LAYOUT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// Default minimum id length; anything of 6 chars or fewer is a path word.
pub const DEFAULT_MIN_ID_LEN: usize = 7;

static TIMESTAMP_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[0-9]+/[a-zA-Z]+/[0-9]+:[0-9]+:[0-9]+:[0-9]+ [+-][0-9]+").unwrap()
});

static SEGMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/[a-zA-Z0-9]+").unwrap());

/// One accepted page hit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub account: String,
    /// Seconds since the Unix epoch.
    pub timestamp: i64,
}

/// A line that looked like a hit but whose timestamp could not be read.
#[derive(Debug)]
pub enum ExtractError {
    Timestamp {
        raw: String,
        source: chrono::ParseError,
    },
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Timestamp { raw, source } => {
                write!(f, "malformed timestamp {raw:?}: {source}")
            }
        }
    }
}

impl std::error::Error for ExtractError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExtractError::Timestamp { source, .. } => Some(source),
        }
    }
}

/// Stateless per-line extractor.
#[derive(Debug, Clone)]
pub struct LineExtractor {
    min_id_len: usize,
}

impl LineExtractor {
    pub fn new(min_id_len: usize) -> Self {
        Self { min_id_len }
    }

    /// Extract an observation from a raw line.
    ///
    /// `Ok(None)` means the line is not a page hit (no timestamp, fewer than
    /// three path segments, or an id that is too short). `Err` is only
    /// returned once the id has been accepted and its timestamp won't parse.
    pub fn extract(&self, line: &str) -> Result<Option<Observation>, ExtractError> {
        let Some(stamp) = TIMESTAMP_PATTERN.find(line) else {
            return Ok(None);
        };

        let rest = &line[stamp.end()..];
        let Some(segment) = SEGMENT_PATTERN.find_iter(rest).nth(2) else {
            return Ok(None);
        };

        let account = &segment.as_str()[1..];
        if account.len() < self.min_id_len {
            return Ok(None);
        }

        let timestamp = parse_log_time(stamp.as_str())?;

        Ok(Some(Observation {
            account: account.to_string(),
            timestamp,
        }))
    }
}

impl Default for LineExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_ID_LEN)
    }
}

/// Parse a log timestamp into epoch seconds.
fn parse_log_time(raw: &str) -> Result<i64, ExtractError> {
    DateTime::parse_from_str(raw, LOG_TIME_LAYOUT)
        .map(|dt| dt.timestamp())
        .map_err(|e| ExtractError::Timestamp {
            raw: raw.to_string(),
            source: e,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIT: &str = r#"10.0.0.7 - - [10/Oct/2000:13:55:36 -0700] "GET /api/v2/0a9f3c21/orders HTTP/1.1" 200 2326 "-" "curl/7.64.1""#;

    #[test]
    fn extracts_account_and_timestamp() {
        let obs = LineExtractor::default().extract(HIT).unwrap().unwrap();
        assert_eq!(obs.account, "0a9f3c21");
        // 2000-10-10T20:55:36Z
        assert_eq!(obs.timestamp, 971211336);
    }

    #[test]
    fn timezone_offset_is_applied() {
        let utc = r#"h - - [10/Oct/2000:20:55:36 +0000] "GET /a/b/abcdefgh HTTP/1.1" 200 1"#;
        let obs = LineExtractor::default().extract(utc).unwrap().unwrap();
        assert_eq!(obs.timestamp, 971211336);
    }

    #[test]
    fn line_without_timestamp_is_skipped() {
        let line = r#"10.0.0.7 - - "GET /api/v2/0a9f3c21/orders HTTP/1.1" 200"#;
        assert!(LineExtractor::default().extract(line).unwrap().is_none());
    }

    #[test]
    fn too_few_segments_is_skipped_not_panicking() {
        let line = r#"10.0.0.7 - - [10/Oct/2000:13:55:36 -0700] "GET /health" 200"#;
        assert!(LineExtractor::default().extract(line).unwrap().is_none());
        let bare = "[10/Oct/2000:13:55:36 -0700]";
        assert!(LineExtractor::default().extract(bare).unwrap().is_none());
    }

    #[test]
    fn short_id_is_skipped() {
        let line = r#"h - - [10/Oct/2000:13:55:36 -0700] "GET /static/css/site12 HTTP/1.1" 200 1"#;
        assert!(LineExtractor::default().extract(line).unwrap().is_none());
    }

    #[test]
    fn id_of_exactly_seven_chars_is_accepted() {
        let line = r#"h - - [10/Oct/2000:13:55:36 -0700] "GET /a/b/abc1234 HTTP/1.1" 200 1"#;
        let obs = LineExtractor::default().extract(line).unwrap().unwrap();
        assert_eq!(obs.account, "abc1234");
    }

    #[test]
    fn min_id_len_is_configurable() {
        let line = r#"h - - [10/Oct/2000:13:55:36 -0700] "GET /a/b/abc HTTP/1.1" 200 1"#;
        assert!(LineExtractor::default().extract(line).unwrap().is_none());
        let obs = LineExtractor::new(3).extract(line).unwrap().unwrap();
        assert_eq!(obs.account, "abc");
    }

    #[test]
    fn segment_stops_at_non_alphanumeric() {
        let line = r#"h - - [10/Oct/2000:13:55:36 -0700] "GET /v1/users/user_12345678/x HTTP/1.1" 200 1"#;
        // "/user" is the third segment; "_12345678" is not part of it.
        assert!(LineExtractor::default().extract(line).unwrap().is_none());
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let line = r#"h - - [99/Foo/2000:13:55:36 -0700] "GET /a/b/abcdefgh HTTP/1.1" 200 1"#;
        let err = LineExtractor::default().extract(line).unwrap_err();
        assert!(matches!(err, ExtractError::Timestamp { .. }));
        assert!(err.to_string().contains("99/Foo/2000"));
    }

    #[test]
    fn malformed_timestamp_with_short_id_is_silently_skipped() {
        let line = r#"h - - [99/Foo/2000:13:55:36 -0700] "GET /a/b/c HTTP/1.1" 200 1"#;
        assert!(LineExtractor::default().extract(line).unwrap().is_none());
    }
}
