// src/parse/metric.rs
//! Small pure helpers shared by every parser and strategy: suffixed counts,
//! tweet ids, relative timestamps and keyword matching.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

static RE_STATUS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"status/(\d+)").expect("status id regex"));
static RE_RELATIVE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\s*([smhd])$").expect("relative time regex"));

/// Parse counts such as `1,234`, `1.2K`, `3M` or `0.5b`.
/// Anything unparseable yields 0.
pub fn parse_metric_number(text: &str) -> u64 {
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return 0;
    }

    let (number, multiplier) = match cleaned.chars().last() {
        Some('k') | Some('K') => (&cleaned[..cleaned.len() - 1], 1_000f64),
        Some('m') | Some('M') => (&cleaned[..cleaned.len() - 1], 1_000_000f64),
        Some('b') | Some('B') => (&cleaned[..cleaned.len() - 1], 1_000_000_000f64),
        _ => (cleaned.as_str(), 1f64),
    };

    match number.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => (v * multiplier).round() as u64,
        _ => 0,
    }
}

/// Pull the numeric tweet id out of a status URL (or any text containing one).
pub fn extract_tweet_id(text: &str) -> Option<String> {
    RE_STATUS_ID
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// Accepts either a status URL or a bare numeric id.
pub fn resolve_tweet_id(url_or_id: &str) -> Option<String> {
    let trimmed = url_or_id.trim();
    if !trimmed.is_empty() && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return Some(trimmed.to_string());
    }
    extract_tweet_id(trimmed)
}

/// Parse mirror timestamps ("5m", "2h", "Oct 10, 2023 · 8:19 PM UTC", ...).
/// Falls back to "now" when nothing matches; mirrors only render approximate times.
pub fn parse_relative_time(text: &str) -> DateTime<Utc> {
    parse_relative_time_at(text, Utc::now())
}

pub fn parse_relative_time_at(text: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let t = text.trim();

    if let Some(caps) = RE_RELATIVE.captures(t) {
        let n: i64 = caps[1].parse::<i64>().unwrap_or(0).min(1_000_000);
        let offset = match &caps[2] {
            "s" => Duration::seconds(n),
            "m" => Duration::minutes(n),
            "h" => Duration::hours(n),
            _ => Duration::days(n),
        };
        return now - offset;
    }

    parse_date(t).unwrap_or(now)
}

/// Generic date parsing over the formats the upstream sources emit.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(t) {
        return Some(dt.with_timezone(&Utc));
    }
    // Platform legacy format: "Wed Oct 10 20:19:24 +0000 2018"
    if let Ok(dt) = DateTime::parse_from_str(t, "%a %b %d %H:%M:%S %z %Y") {
        return Some(dt.with_timezone(&Utc));
    }

    // Mirror tooltip: "Oct 10, 2023 · 8:19 PM UTC"
    let tooltip = t.replace('\u{00B7}', "").replace(" UTC", "");
    let tooltip = tooltip.split_whitespace().collect::<Vec<_>>().join(" ");
    for fmt in ["%b %d, %Y %I:%M %p", "%b %e, %Y %l:%M %p"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&tooltip, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    for fmt in ["%b %d, %Y", "%d %b %Y", "%Y-%m-%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(t, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
        }
    }
    None
}

/// OR-match, case-insensitive. An empty keyword list never filters.
pub fn matches_keywords<S: AsRef<str>>(content: &str, keywords: &[S]) -> bool {
    let wanted: Vec<String> = keywords
        .iter()
        .map(|k| k.as_ref().trim().to_lowercase())
        .filter(|k| !k.is_empty())
        .collect();
    if wanted.is_empty() {
        return true;
    }
    let haystack = content.to_lowercase();
    wanted.iter().any(|k| haystack.contains(k.as_str()))
}

/// `@Handle ` -> `handle`
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}
