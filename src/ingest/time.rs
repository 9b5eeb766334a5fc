// src/ingest/time.rs
//! Publish-time parsing. Naive timestamps from the source are Beijing time (UTC+8).

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, Offset, TimeZone, Utc};
use serde_json::Value;

const SOURCE_UTC_OFFSET_SECS: i32 = 8 * 3600;

const API_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%SZ",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const PAGE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
];

const RELATIVE_MARKERS: &[&str] = &["小时前", "分钟前", "天前"];

fn source_tz() -> FixedOffset {
    FixedOffset::east_opt(SOURCE_UTC_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

fn from_naive(n: NaiveDateTime) -> Option<DateTime<Utc>> {
    source_tz()
        .from_local_datetime(&n)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

fn from_unix(secs: f64) -> Option<DateTime<Utc>> {
    if !secs.is_finite() || secs < 0.0 {
        return None;
    }
    // millisecond timestamps are common in JSON APIs
    let secs = if secs > 1e11 { secs / 1000.0 } else { secs };
    DateTime::from_timestamp(secs.trunc() as i64, 0)
}

fn parse_formats(s: &str, formats: &[&str]) -> Option<DateTime<Utc>> {
    formats
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
        .and_then(from_naive)
}

/// API time field: unix seconds (number or numeric string) or a formatted string.
/// Anything unparseable maps to `now`.
pub fn parse_api_time(value: Option<&Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64().and_then(from_unix),
        Some(Value::String(s)) => {
            let s = s.trim();
            parse_formats(s, API_FORMATS).or_else(|| s.parse::<f64>().ok().and_then(from_unix))
        }
        _ => None,
    };
    parsed.unwrap_or(now)
}

/// List-page time text. Accepts relative phrases ("2小时前" → now) and year-less dates.
pub fn parse_page_time(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let t = text.trim();
    if RELATIVE_MARKERS.iter().any(|m| t.contains(m)) {
        return now;
    }
    if let Some(dt) = parse_formats(t, PAGE_FORMATS) {
        return dt;
    }
    // year-less "MM-DD HH:MM" / "MM/DD HH:MM" take the current source-local year
    let year = now.with_timezone(&source_tz()).year();
    [
        ("%Y-%m-%d %H:%M", format!("{year}-{t}")),
        ("%Y/%m/%d %H:%M", format!("{year}/{t}")),
    ]
    .iter()
    .find_map(|(f, s)| NaiveDateTime::parse_from_str(s, f).ok())
    .and_then(from_naive)
    .unwrap_or(now)
}
