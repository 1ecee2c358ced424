//! Time arithmetic over `HH:MM:SS` strings
//!
//! Cue start times and run times are stored as plain strings. Arithmetic
//! never wraps at 24 hours (`23:00:00 + 02:00:00 == 25:00:00`), while
//! [`is_valid_time_format`] only accepts a 24-hour clock. Both behaviors are
//! relied upon: sheets may run past midnight, but users type clock times.
//!
//! The lenient helpers return `None` for malformed input instead of a
//! signaled error; callers that accept user input go through
//! [`parse_time_strict`] first.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeError {
    #[error("Invalid time format: expected 'HH:MM:SS', got '{0}'")]
    InvalidFormat(String),
}

/// Structural form of a time string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TimeParts {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl TimeParts {
    pub fn new(hours: u64, minutes: u64, seconds: u64) -> Self {
        Self {
            hours,
            minutes,
            seconds,
        }
    }

    /// Total elapsed seconds
    pub fn total_seconds(&self) -> u64 {
        self.hours
            .saturating_mul(3600)
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds)
    }
}

impl fmt::Display for TimeParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

fn parse_component(part: &str) -> Option<u64> {
    if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

/// Splits `HH:MM:SS` into its parts without range checks
pub fn parse_time(time: &str) -> Option<TimeParts> {
    let mut parts = time.split(':');
    let hours = parse_component(parts.next()?)?;
    let minutes = parse_component(parts.next()?)?;
    let seconds = parse_component(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(TimeParts::new(hours, minutes, seconds))
}

/// Parses a user-supplied time, rejecting anything outside the 24-hour clock
pub fn parse_time_strict(time: &str) -> Result<TimeParts, TimeError> {
    if !is_valid_time_format(time) {
        return Err(TimeError::InvalidFormat(time.to_string()));
    }
    parse_time(time).ok_or_else(|| TimeError::InvalidFormat(time.to_string()))
}

/// Formats parts as `HH:MM:SS`, padding each component to two digits
pub fn format_time(parts: TimeParts) -> String {
    parts.to_string()
}

pub fn time_to_seconds(time: &str) -> Option<u64> {
    parse_time(time).map(|parts| parts.total_seconds())
}

/// Converts elapsed seconds to `HH:MM:SS`; hours are not capped at 24
pub fn seconds_to_time(total_seconds: u64) -> String {
    format_time(TimeParts::new(
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
    ))
}

pub fn add_times(time1: &str, time2: &str) -> Option<String> {
    let total = time_to_seconds(time1)?.saturating_add(time_to_seconds(time2)?);
    Some(seconds_to_time(total))
}

/// Derives a cue's end time from its start time and run time
pub fn calculate_end_time(start_time: &str, duration: &str) -> Option<String> {
    add_times(start_time, duration)
}

/// Checks `^([0-1]?[0-9]|2[0-3]):[0-5][0-9]:[0-5][0-9]$`
pub fn is_valid_time_format(time: &str) -> bool {
    let parts: Vec<&[u8]> = time.split(':').map(str::as_bytes).collect();
    let [hours, minutes, seconds] = parts.as_slice() else {
        return false;
    };

    let hours_ok = match hours {
        [h] => h.is_ascii_digit(),
        [b'0' | b'1', h] => h.is_ascii_digit(),
        [b'2', h] => (b'0'..=b'3').contains(h),
        _ => false,
    };

    hours_ok && is_sexagesimal(minutes) && is_sexagesimal(seconds)
}

fn is_sexagesimal(part: &[u8]) -> bool {
    matches!(part, [tens, units] if (b'0'..=b'5').contains(tens) && units.is_ascii_digit())
}

/// Signed difference `time1 - time2` in seconds
pub fn compare_times(time1: &str, time2: &str) -> Option<i64> {
    let a = i64::try_from(time_to_seconds(time1)?).unwrap_or(i64::MAX);
    let b = i64::try_from(time_to_seconds(time2)?).unwrap_or(i64::MAX);
    Some(a.saturating_sub(b))
}

/// Orders two time strings by elapsed seconds
pub fn cmp_times(time1: &str, time2: &str) -> Option<Ordering> {
    compare_times(time1, time2).map(|diff| diff.cmp(&0))
}

/// Renders a duration for display: `1h 2m 3s`, `2m 3s` or `3s`
pub fn format_duration(duration: &str) -> Option<String> {
    let TimeParts {
        hours,
        minutes,
        seconds,
    } = parse_time(duration)?;

    let text = if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    };
    Some(text)
}

/// Absolute distance between two times
pub fn get_time_difference(time1: &str, time2: &str) -> Option<String> {
    let a = time_to_seconds(time1)?;
    let b = time_to_seconds(time2)?;
    Some(seconds_to_time(a.abs_diff(b)))
}

/// Sums the durations that parse, skipping the rest
pub fn sum_durations<'a, I>(durations: I) -> u64
where
    I: IntoIterator<Item = &'a str>,
{
    durations.into_iter().filter_map(time_to_seconds).sum()
}

/// Formats seconds as `H:MM:SS` with unpadded hours, as shown on the dashboard
pub fn format_clock(total_seconds: u64) -> String {
    format!(
        "{}:{:02}:{:02}",
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60
    )
}
