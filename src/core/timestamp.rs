//! Timestamp rendering for event output
//!
//! Events carry milliseconds since the Unix epoch; formatters render them
//! through one of these formats.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// Standardized timestamp format options
///
/// # Examples
///
/// ```
/// use rust_async_logger::core::TimestampFormat;
///
/// let format = TimestampFormat::Iso8601;
/// assert_eq!(format.format_millis(0), "1970-01-01T00:00:00.000Z");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// RFC 3339 with offset: `2025-01-08T10:30:45.123+00:00`
    Rfc3339,

    /// Unix timestamp in seconds: `1736332245`
    Unix,

    /// Unix timestamp in milliseconds: `1736332245123`
    UnixMillis,

    /// Custom strftime format
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_async_logger::core::TimestampFormat;
    ///
    /// // Apache log format
    /// let format = TimestampFormat::Custom("%d/%b/%Y:%H:%M:%S %z".to_string());
    /// ```
    Custom(String),
}

impl TimestampFormat {
    /// Append `millis` (since the epoch) rendered in this format to `out`.
    ///
    /// Values outside chrono's range fall back to the raw millisecond count.
    pub fn write_millis(&self, millis: i64, out: &mut String) {
        let datetime = match self {
            TimestampFormat::UnixMillis => {
                let _ = write!(out, "{}", millis);
                return;
            }
            TimestampFormat::Unix => {
                let _ = write!(out, "{}", millis.div_euclid(1000));
                return;
            }
            _ => match Utc.timestamp_millis_opt(millis).single() {
                Some(dt) => dt,
                None => {
                    let _ = write!(out, "{}", millis);
                    return;
                }
            },
        };
        self.write_datetime(&datetime, out);
    }

    fn write_datetime(&self, datetime: &DateTime<Utc>, out: &mut String) {
        let _ = match self {
            TimestampFormat::Iso8601 => {
                write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.3fZ"))
            }
            TimestampFormat::Rfc3339 => {
                write!(out, "{}", datetime.format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
            }
            TimestampFormat::Custom(format_str) => write!(out, "{}", datetime.format(format_str)),
            TimestampFormat::Unix => write!(out, "{}", datetime.timestamp()),
            TimestampFormat::UnixMillis => write!(out, "{}", datetime.timestamp_millis()),
        };
    }

    #[must_use]
    pub fn format_millis(&self, millis: i64) -> String {
        let mut out = String::with_capacity(32);
        self.write_millis(millis, &mut out);
        out
    }

    /// Check if this is a Unix-based numeric format
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, TimestampFormat::Unix | TimestampFormat::UnixMillis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-01-08 10:30:45.123 UTC
    const FIXED_MILLIS: i64 = 1_736_332_245_123;

    #[test]
    fn test_iso8601_format() {
        assert_eq!(
            TimestampFormat::Iso8601.format_millis(FIXED_MILLIS),
            "2025-01-08T10:30:45.123Z"
        );
    }

    #[test]
    fn test_rfc3339_format() {
        assert_eq!(
            TimestampFormat::Rfc3339.format_millis(FIXED_MILLIS),
            "2025-01-08T10:30:45.123+00:00"
        );
    }

    #[test]
    fn test_numeric_formats() {
        assert_eq!(TimestampFormat::Unix.format_millis(FIXED_MILLIS), "1736332245");
        assert_eq!(TimestampFormat::UnixMillis.format_millis(FIXED_MILLIS), "1736332245123");
        assert_eq!(TimestampFormat::Unix.format_millis(-1), "-1");
    }

    #[test]
    fn test_custom_apache_format() {
        let format = TimestampFormat::Custom("%d/%b/%Y:%H:%M:%S +0000".to_string());
        assert_eq!(format.format_millis(FIXED_MILLIS), "08/Jan/2025:10:30:45 +0000");
    }

    #[test]
    fn test_out_of_range_falls_back_to_millis() {
        assert_eq!(TimestampFormat::Iso8601.format_millis(i64::MAX), i64::MAX.to_string());
    }

    #[test]
    fn test_is_numeric() {
        assert!(!TimestampFormat::Iso8601.is_numeric());
        assert!(!TimestampFormat::Rfc3339.is_numeric());
        assert!(TimestampFormat::Unix.is_numeric());
        assert!(TimestampFormat::UnixMillis.is_numeric());
        assert!(!TimestampFormat::Custom("%Y".to_string()).is_numeric());
    }

    #[test]
    fn test_serde_round_trip_names() {
        let json = serde_json::to_string(&TimestampFormat::Iso8601).unwrap();
        assert_eq!(json, "\"Iso8601\"");

        let format: TimestampFormat = serde_json::from_str(r#"{"Custom":"%Y-%m-%d"}"#).unwrap();
        assert_eq!(format, TimestampFormat::Custom("%Y-%m-%d".to_string()));
    }
}
