use std::sync::LazyLock;

use regex::{Captures, Regex};

use super::ParseError;

/// A time token is either `H:MM`/`HH:MM` or the compact `HHMM`.
const TIME_TOKEN: &str = r"[0-9]{1,2}:[0-9]{2}|[0-9]{4}";

static COLON_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{1,2}):([0-9]{2})$").expect("valid regex"));
static COMPACT_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{2})([0-9]{2})$").expect("valid regex"));

static BETWEEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"between\s+(?P<start>{TIME_TOKEN})(?:\s+(?:and|to|-)\s+|\s*-\s*)(?P<end>{TIME_TOKEN})"
    ))
    .expect("valid regex")
});
static OPENS_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:opens?|opening)\s+(?:at\s+)?(?P<time>{TIME_TOKEN})"
    ))
    .expect("valid regex")
});
static CLOSES_AT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?:closes?|closing)\s+(?:at\s+)?(?P<time>{TIME_TOKEN})"
    ))
    .expect("valid regex")
});

/// The time part of a parsed query.
///
/// `OpenBy(t)` keeps restaurants whose `openHour <= t`, `CloseBy(t)` keeps
/// restaurants whose `closeHour >= t`. `CurrentTime` is resolved to the wall
/// clock only when the filter is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TimeConstraint {
    OpenBy(String),
    CloseBy(String),
    Range { open_by: String, close_by: String },
    CurrentTime,
}

/// Normalizes a time token to the zero-padded `HH:MM` form.
///
/// # Errors
///
/// Returns [`ParseError::InvalidTimeFormat`] if the token has neither shape or
/// if the hour or minute is out of range.
pub(crate) fn normalize_time(token: &str) -> Result<String, ParseError> {
    let trimmed = token.trim();
    let caps = COLON_TIME
        .captures(trimmed)
        .or_else(|| COMPACT_TIME.captures(trimmed))
        .ok_or_else(|| ParseError::InvalidTimeFormat(trimmed.to_string()))?;

    let hour = number(&caps, 1).filter(|h| *h <= 23);
    let minute = number(&caps, 2).filter(|m| *m <= 59);
    match (hour, minute) {
        (Some(hour), Some(minute)) => Ok(format!("{hour:02}:{minute:02}")),
        _ => Err(ParseError::InvalidTimeFormat(trimmed.to_string())),
    }
}

fn number(caps: &Captures<'_>, group: usize) -> Option<u8> {
    caps.get(group)?.as_str().parse().ok()
}

/// Extracts the time constraint from a free-text query.
///
/// `between` ranges take priority over `opens at`, which takes priority over
/// `closes at`. Without any of them the query falls back to the current time.
///
/// # Errors
///
/// Returns [`ParseError::InvalidTimeFormat`] for an out-of-range time token and
/// [`ParseError::MidnightCrossingUnsupported`] for a range whose start is later
/// than its end.
pub(crate) fn parse_time_constraint(query: &str) -> Result<TimeConstraint, ParseError> {
    let query = query.to_lowercase();

    if let Some(caps) = BETWEEN.captures(&query) {
        let start = normalize_time(&caps["start"])?;
        let end = normalize_time(&caps["end"])?;
        if start > end {
            return Err(ParseError::MidnightCrossingUnsupported { start, end });
        }
        return Ok(TimeConstraint::Range {
            open_by: start,
            close_by: end,
        });
    }

    if let Some(caps) = OPENS_AT.captures(&query) {
        return Ok(TimeConstraint::OpenBy(normalize_time(&caps["time"])?));
    }

    if let Some(caps) = CLOSES_AT.captures(&query) {
        return Ok(TimeConstraint::CloseBy(normalize_time(&caps["time"])?));
    }

    Ok(TimeConstraint::CurrentTime)
}
