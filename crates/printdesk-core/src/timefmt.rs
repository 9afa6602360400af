//! Duration conversions. Minutes are the canonical unit everywhere else in
//! the crate; hours only appear at input boundaries.

use chrono::{DateTime, Duration, Utc};

/// Formats minutes as `HH:MM`, flooring to the minute. Hours may exceed 24.
pub fn minutes_to_hhmm(minutes: f64) -> String {
    let total = if minutes.is_finite() && minutes > 0.0 {
        minutes.floor() as u64
    } else {
        0
    };
    format!("{:02}:{:02}", total / 60, total % 60)
}

/// Like [`minutes_to_hhmm`], with `None` rendered as `00:00`.
pub fn format_minutes(minutes: Option<f64>) -> String {
    minutes_to_hhmm(minutes.unwrap_or(0.0))
}

pub fn hours_to_hhmm(hours: f64) -> String {
    minutes_to_hhmm(hours_to_minutes(hours))
}

/// Parses `HH:MM` into minutes. Anything malformed is `0.0`.
pub fn parse_hhmm(s: &str) -> f64 {
    let Some((h, m)) = s.trim().split_once(':') else {
        return 0.0;
    };
    match (h.trim().parse::<u64>(), m.trim().parse::<u64>()) {
        (Ok(h), Ok(m)) => (h * 60 + m) as f64,
        _ => 0.0,
    }
}

pub fn hours_to_minutes(hours: f64) -> f64 {
    hours * 60.0
}

pub fn minutes_to_hours(minutes: f64) -> f64 {
    minutes / 60.0
}

/// Signed minutes from `from` to `to`, millisecond resolution.
pub fn minutes_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 60_000.0
}

/// `t` shifted by `minutes`, or `None` when the result leaves chrono's range.
pub fn add_minutes(t: DateTime<Utc>, minutes: f64) -> Option<DateTime<Utc>> {
    let millis = (minutes * 60_000.0).round();
    if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
        return None;
    }
    t.checked_add_signed(Duration::try_milliseconds(millis as i64)?)
}
