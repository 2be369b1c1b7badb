//! Translation of free-text restaurant queries into store filters.
//!
//! A query is scanned for a vegetarian preference, a cuisine style and a
//! time constraint. The result is either a [`Filter`] ready for
//! [`Database::find`](crate::database::Database::find) or a message that can
//! be shown to the caller as is.

mod keyword;
mod time;

use serde::Serialize;
use tracing::{info, warn};

pub(crate) use self::keyword::{parse_style, parse_vegetarian, Style, Vegetarian};
pub(crate) use self::time::{normalize_time, parse_time_constraint, TimeConstraint};
use crate::restaurant::Restaurant;

pub(crate) const EMPTY_QUERY_MESSAGE: &str = "query is empty";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum ParseError {
    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Time ranges crossing midnight are not supported: {start} to {end}")]
    MidnightCrossingUnsupported { start: String, end: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ParsedQuery {
    pub(crate) vegetarian: Vegetarian,
    pub(crate) style: Option<Style>,
    pub(crate) time: TimeConstraint,
    /// The trimmed query text, kept for logging.
    pub(crate) raw: String,
}

/// Comparison against a zero-padded `HH:MM` value. Such strings order the
/// same way lexicographically as chronologically within one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) enum Bound {
    #[serde(rename = "$lte")]
    AtMost(String),
    #[serde(rename = "$gte")]
    AtLeast(String),
}

impl Bound {
    fn holds(&self, value: &str) -> bool {
        match self {
            Bound::AtMost(limit) => value <= limit.as_str(),
            Bound::AtLeast(limit) => value >= limit.as_str(),
        }
    }
}

/// Predicates a restaurant must satisfy, keyed by record field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Filter {
    pub(crate) vegetarian: Vegetarian,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) style: Option<Style>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) open_hour: Option<Bound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) close_hour: Option<Bound>,
}

impl Filter {
    /// Builds the filter for `parsed`. A query without an explicit time is
    /// evaluated at `now`, which must already be in `HH:MM` form.
    pub(crate) fn new(parsed: &ParsedQuery, now: &str) -> Self {
        let (open_by, close_by) = match &parsed.time {
            TimeConstraint::OpenBy(open_by) => (Some(open_by.as_str()), None),
            TimeConstraint::CloseBy(close_by) => (None, Some(close_by.as_str())),
            TimeConstraint::Range { open_by, close_by } => {
                (Some(open_by.as_str()), Some(close_by.as_str()))
            }
            TimeConstraint::CurrentTime => (Some(now), Some(now)),
        };
        Self {
            vegetarian: parsed.vegetarian,
            style: parsed.style,
            open_hour: open_by.map(|t| Bound::AtMost(t.to_string())),
            close_hour: close_by.map(|t| Bound::AtLeast(t.to_string())),
        }
    }

    pub(crate) fn matches(&self, restaurant: &Restaurant) -> bool {
        restaurant.vegetarian == self.vegetarian.as_str()
            && self
                .style
                .is_none_or(|style| restaurant.style == style.as_str())
            && self
                .open_hour
                .as_ref()
                .is_none_or(|bound| bound.holds(&restaurant.open_hour))
            && self
                .close_hour
                .as_ref()
                .is_none_or(|bound| bound.holds(&restaurant.close_hour))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum QueryOutcome {
    /// The query was empty or whitespace only.
    Empty,
    Parsed { parsed: ParsedQuery, filter: Filter },
    /// The query could not be parsed; the message is safe to return as is.
    Rejected(String),
}

/// Parses a non-empty query. Empty input is handled by [`process_query`].
///
/// # Errors
///
/// Returns an error if the time constraint in the query is invalid.
pub(crate) fn parse_query(query: &str) -> Result<ParsedQuery, ParseError> {
    let query = query.trim();
    let vegetarian = parse_vegetarian(query);
    let style = parse_style(query);
    let time = parse_time_constraint(query)?;
    Ok(ParsedQuery {
        vegetarian,
        style,
        time,
        raw: query.to_string(),
    })
}

/// The current local time as `HH:MM`.
pub(crate) fn current_time() -> String {
    chrono::Local::now().format("%H:%M").to_string()
}

pub(crate) fn process_query(query: &str) -> QueryOutcome {
    if query.trim().is_empty() {
        return QueryOutcome::Empty;
    }
    process_query_at(query, &current_time())
}

/// Same as [`process_query`], with queries lacking an explicit time
/// evaluated at `now` (`HH:MM`).
pub(crate) fn process_query_at(query: &str, now: &str) -> QueryOutcome {
    if query.trim().is_empty() {
        return QueryOutcome::Empty;
    }
    match parse_query(query) {
        Ok(parsed) => {
            let filter = Filter::new(&parsed, now);
            info!(
                "Query parsed: query={:?}, vegetarian={}, style={:?}, time={:?}",
                parsed.raw, parsed.vegetarian, parsed.style, parsed.time
            );
            QueryOutcome::Parsed { parsed, filter }
        }
        Err(e) => {
            warn!("Query parse error: {e}");
            QueryOutcome::Rejected(e.to_string())
        }
    }
}
