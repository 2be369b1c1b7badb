use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::query::normalize_time;

/// Every record must carry exactly these fields.
#[allow(unused)]
pub(crate) const REQUIRED_FIELDS: [&str; 6] = [
    "name",
    "style",
    "address",
    "vegetarian",
    "openHour",
    "closeHour",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Restaurant {
    pub(crate) name: String,
    pub(crate) style: String,
    pub(crate) address: String,
    /// `"yes"` or `"no"`.
    pub(crate) vegetarian: String,
    /// `HH:MM`
    pub(crate) open_hour: String,
    /// `HH:MM`
    pub(crate) close_hour: String,
}

#[allow(unused)]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum RecordError {
    #[error("{field}: must be a string")]
    NotAString { field: &'static str },

    #[error("{field}: must not be empty")]
    Empty { field: &'static str },

    #[error("vegetarian: must be 'yes' or 'no'")]
    Vegetarian,

    #[error("{field}: {reason}")]
    Time { field: &'static str, reason: String },
}

/// Why a loader entry was rejected.
#[allow(unused)]
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct InvalidRecord {
    /// Position of the entry in the input array.
    pub(crate) index: usize,
    pub(crate) data: Value,
    pub(crate) missing_fields: Vec<String>,
    pub(crate) extra_fields: Vec<String>,
    pub(crate) errors: Vec<String>,
}

#[allow(unused)]
impl InvalidRecord {
    fn new(index: usize, data: &Value) -> Self {
        Self {
            index,
            data: data.clone(),
            missing_fields: Vec::new(),
            extra_fields: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl fmt::Display for InvalidRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "invalid entry at index {}", self.index)?;
        if !self.missing_fields.is_empty() {
            write!(f, "; missing fields: {}", self.missing_fields.join(", "))?;
        }
        if !self.extra_fields.is_empty() {
            write!(f, "; extra fields: {}", self.extra_fields.join(", "))?;
        }
        for error in &self.errors {
            write!(f, "; {error}")?;
        }
        Ok(())
    }
}

/// Validates one loader entry and normalizes its values.
///
/// The entry must be an object with exactly [`REQUIRED_FIELDS`]. Missing and
/// unexpected fields are reported before any value is looked at.
///
/// # Errors
///
/// Returns an [`InvalidRecord`] describing every problem found.
#[allow(unused)]
pub(crate) fn validate(index: usize, data: &Value) -> Result<Restaurant, InvalidRecord> {
    let Some(object) = data.as_object() else {
        let mut invalid = InvalidRecord::new(index, data);
        invalid
            .errors
            .push(format!("expected object, got {}", json_type(data)));
        return Err(invalid);
    };

    let mut invalid = InvalidRecord::new(index, data);
    invalid.missing_fields = REQUIRED_FIELDS
        .iter()
        .filter(|field| !object.contains_key(**field))
        .map(ToString::to_string)
        .collect();
    invalid.extra_fields = object
        .keys()
        .filter(|key| !REQUIRED_FIELDS.contains(&key.as_str()))
        .cloned()
        .collect();
    if !invalid.missing_fields.is_empty() || !invalid.extra_fields.is_empty() {
        return Err(invalid);
    }

    let name = non_empty(object, "name");
    let style = text(object, "style").map(|s| title_case(&s));
    let address = non_empty(object, "address");
    let vegetarian = text(object, "vegetarian").and_then(|v| {
        let v = v.to_lowercase();
        if v == "yes" || v == "no" {
            Ok(v)
        } else {
            Err(RecordError::Vegetarian)
        }
    });
    let open_hour = hour(object, "openHour");
    let close_hour = hour(object, "closeHour");

    match (name, style, address, vegetarian, open_hour, close_hour) {
        (Ok(name), Ok(style), Ok(address), Ok(vegetarian), Ok(open_hour), Ok(close_hour)) => {
            Ok(Restaurant {
                name,
                style,
                address,
                vegetarian,
                open_hour,
                close_hour,
            })
        }
        (name, style, address, vegetarian, open_hour, close_hour) => {
            invalid.errors = [
                name.err(),
                style.err(),
                address.err(),
                vegetarian.err(),
                open_hour.err(),
                close_hour.err(),
            ]
            .into_iter()
            .flatten()
            .map(|e| e.to_string())
            .collect();
            Err(invalid)
        }
    }
}

#[allow(unused)]
fn text(object: &Map<String, Value>, field: &'static str) -> Result<String, RecordError> {
    object
        .get(field)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or(RecordError::NotAString { field })
}

#[allow(unused)]
fn non_empty(object: &Map<String, Value>, field: &'static str) -> Result<String, RecordError> {
    let value = text(object, field)?;
    if value.is_empty() {
        return Err(RecordError::Empty { field });
    }
    Ok(value)
}

#[allow(unused)]
fn hour(object: &Map<String, Value>, field: &'static str) -> Result<String, RecordError> {
    let value = text(object, field)?;
    normalize_time(&value).map_err(|e| RecordError::Time {
        field,
        reason: e.to_string(),
    })
}

/// Upper-cases the first letter of every alphabetic run and lower-cases the
/// rest, so "steak house" becomes "Steak House".
#[allow(unused)]
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_alpha = false;
    for c in s.chars() {
        if prev_is_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_is_alpha = c.is_alphabetic();
    }
    out
}

#[allow(unused)]
pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
