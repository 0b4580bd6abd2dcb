//! Wire values and the normalizer that turns them into domain types.
//!
//! The embedded backend hands back natively typed values; the remote
//! backend serialises everything as JSON, so integers arrive as `f64`
//! and timestamps as strings. Every value read from either backend goes
//! through the functions in this module before it reaches a record.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

/// A single column value (or bound parameter) as the driver sees it.
#[derive(Debug, Clone, PartialEq)]
pub enum WireValue {
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Timestamp(DateTime<Utc>),
    Null,
}

impl WireValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short name of the wire shape, used in mismatch errors.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Integer(_) => "integer",
            Self::Real(_) => "float",
            Self::Text(_) => "string",
            Self::Blob(_) => "bytes",
            Self::Timestamp(_) => "timestamp",
            Self::Null => "null",
        }
    }
}

impl From<i64> for WireValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<&str> for WireValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for WireValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<DateTime<Utc>> for WireValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<WireValue>> From<Option<T>> for WireValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Errors produced while normalising a single wire value.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizeError {
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("float {0} is not an integral value")]
    NonIntegral(f64),

    #[error("float {0} does not fit in a 64-bit integer")]
    OutOfRange(f64),

    #[error("timestamp `{0}` matches no known format")]
    Timestamp(String),

    #[error("byte string is not valid UTF-8")]
    Utf8,
}

/// Naive layouts tried after RFC 3339, in order. Values are taken as UTC.
const NAIVE_LAYOUTS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const I64_MIN_F: f64 = i64::MIN as f64;
const I64_END_F: f64 = 9_223_372_036_854_775_808.0;

/// Normalise to a signed 64-bit integer.
///
/// Native integers pass through; floats are accepted only when integral
/// and inside the `i64` range.
pub fn to_i64(value: &WireValue) -> Result<i64, NormalizeError> {
    match value {
        WireValue::Integer(i) => Ok(*i),
        WireValue::Real(f) if !f.is_finite() || f.fract() != 0.0 => {
            Err(NormalizeError::NonIntegral(*f))
        }
        // `as` saturates; 2^63 itself is already out of range.
        WireValue::Real(f) if *f < I64_MIN_F || *f >= I64_END_F => {
            Err(NormalizeError::OutOfRange(*f))
        }
        WireValue::Real(f) => Ok(*f as i64),
        other => Err(NormalizeError::Mismatch {
            expected: "integer",
            found: other.shape(),
        }),
    }
}

/// Like [`to_i64`], but `Null` is the absent marker.
pub fn to_opt_i64(value: &WireValue) -> Result<Option<i64>, NormalizeError> {
    match value {
        WireValue::Null => Ok(None),
        other => to_i64(other).map(Some),
    }
}

pub fn to_string(value: &WireValue) -> Result<String, NormalizeError> {
    match value {
        WireValue::Text(s) => Ok(s.clone()),
        WireValue::Blob(b) => String::from_utf8(b.clone()).map_err(|_| NormalizeError::Utf8),
        other => Err(NormalizeError::Mismatch {
            expected: "string",
            found: other.shape(),
        }),
    }
}

/// Normalise to a timestamp. `Null` yields `Ok(None)`, never the epoch.
pub fn to_timestamp(value: &WireValue) -> Result<Option<DateTime<Utc>>, NormalizeError> {
    match value {
        WireValue::Null => Ok(None),
        WireValue::Timestamp(ts) => Ok(Some(*ts)),
        WireValue::Text(s) => parse_timestamp(s).map(Some),
        WireValue::Blob(b) => {
            let s = std::str::from_utf8(b).map_err(|_| NormalizeError::Utf8)?;
            parse_timestamp(s).map(Some)
        }
        other => Err(NormalizeError::Mismatch {
            expected: "timestamp",
            found: other.shape(),
        }),
    }
}

/// Parse a textual timestamp; the first layout that matches wins.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, NormalizeError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Ok(ts.with_timezone(&Utc));
    }

    NAIVE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(s, layout).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| NormalizeError::Timestamp(s.to_owned()))
}

/// Fixed-width RFC 3339 rendering used when a timestamp has to travel as text.
///
/// Nanosecond precision and a `Z` suffix keep lexical order equal to
/// chronological order, which `ORDER BY created_at` relies on.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike};

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn integers_accept_native_and_integral_floats() {
        assert_eq!(to_i64(&WireValue::Integer(7)).unwrap(), 7);
        assert_eq!(to_i64(&WireValue::Real(42.0)).unwrap(), 42);
        assert_eq!(to_i64(&WireValue::Real(-3.0)).unwrap(), -3);
    }

    #[test]
    fn integers_reject_fractions_and_other_shapes() {
        assert_eq!(to_i64(&WireValue::Real(1.5)), Err(NormalizeError::NonIntegral(1.5)));
        assert!(matches!(
            to_i64(&WireValue::Text("12".into())),
            Err(NormalizeError::Mismatch { expected: "integer", found: "string" })
        ));
        assert!(to_i64(&WireValue::Null).is_err());
        assert!(to_i64(&WireValue::Real(f64::NAN)).is_err());
    }

    #[test]
    fn integers_reject_floats_beyond_i64() {
        assert_eq!(to_i64(&WireValue::Real(1e19)), Err(NormalizeError::OutOfRange(1e19)));
        assert_eq!(to_i64(&WireValue::Real(-1e300)), Err(NormalizeError::OutOfRange(-1e300)));
        assert_eq!(
            to_i64(&WireValue::Real(9_223_372_036_854_775_808.0)),
            Err(NormalizeError::OutOfRange(9_223_372_036_854_775_808.0))
        );
        assert_eq!(to_i64(&WireValue::Real(i64::MIN as f64)).unwrap(), i64::MIN);
        assert_eq!(to_i64(&WireValue::Real(9_007_199_254_740_992.0)).unwrap(), 1 << 53);
    }

    #[test]
    fn nullable_reference_maps_null_to_absent() {
        assert_eq!(to_opt_i64(&WireValue::Null).unwrap(), None);
        assert_eq!(to_opt_i64(&WireValue::Real(3.0)).unwrap(), Some(3));
    }

    #[test]
    fn strings_accept_text_and_utf8_bytes() {
        assert_eq!(to_string(&WireValue::Text("a".into())).unwrap(), "a");
        assert_eq!(to_string(&WireValue::Blob(b"room".to_vec())).unwrap(), "room");
        assert_eq!(to_string(&WireValue::Blob(vec![0xff, 0xfe])), Err(NormalizeError::Utf8));
        assert!(to_string(&WireValue::Integer(1)).is_err());
    }

    #[test]
    fn timestamp_layouts_are_all_recognised() {
        let expected = utc(2024, 3, 9, 14, 5, 30);
        for raw in [
            "2024-03-09T14:05:30Z",
            "2024-03-09T16:05:30+02:00",
            "2024-03-09 14:05:30",
            "2024-03-09T14:05:30",
        ] {
            assert_eq!(parse_timestamp(raw).unwrap(), expected, "layout {raw}");
        }

        let frac = parse_timestamp("2024-03-09 14:05:30.250").unwrap();
        assert_eq!(frac.nanosecond(), 250_000_000);
        let frac_t = parse_timestamp("2024-03-09T14:05:30.123456789").unwrap();
        assert_eq!(frac_t.nanosecond(), 123_456_789);
        let rfc_nano = parse_timestamp("2024-03-09T14:05:30.5Z").unwrap();
        assert_eq!(rfc_nano.nanosecond(), 500_000_000);
    }

    #[test]
    fn unparseable_timestamp_is_an_error_not_zero() {
        assert_eq!(
            to_timestamp(&WireValue::Text("yesterday".into())),
            Err(NormalizeError::Timestamp("yesterday".into()))
        );
    }

    #[test]
    fn null_timestamp_is_absent() {
        assert_eq!(to_timestamp(&WireValue::Null).unwrap(), None);
    }

    #[test]
    fn timestamps_from_bytes_and_native_values() {
        let expected = utc(2023, 12, 31, 23, 59, 59);
        assert_eq!(
            to_timestamp(&WireValue::Blob(b"2023-12-31 23:59:59".to_vec())).unwrap(),
            Some(expected)
        );
        assert_eq!(to_timestamp(&WireValue::Timestamp(expected)).unwrap(), Some(expected));
        assert!(to_timestamp(&WireValue::Real(1.0)).is_err());
    }

    #[test]
    fn formatted_timestamps_parse_back() {
        let ts = utc(2024, 1, 2, 3, 4, 5);
        let text = format_timestamp(&ts);
        assert_eq!(text, "2024-01-02T03:04:05.000000000Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }
}
