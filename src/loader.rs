use std::{fmt, fs, io::ErrorKind, path::Path};

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::{error, info};

use crate::{
    database::Database,
    restaurant::{self, InvalidRecord},
};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LoadStats {
    pub(crate) total: usize,
    pub(crate) inserted: usize,
    /// Entries already present with the same name and address.
    pub(crate) skipped: usize,
    pub(crate) invalid: usize,
}

impl fmt::Display for LoadStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f, "LOAD SUMMARY")?;
        writeln!(f, "{}", "=".repeat(40))?;
        writeln!(f, "  Total entries:  {}", self.total)?;
        writeln!(f, "  Inserted:       {}", self.inserted)?;
        writeln!(f, "  Skipped:        {} (already exist)", self.skipped)?;
        writeln!(f, "  Invalid:        {} (validation errors)", self.invalid)?;
        write!(f, "{}", "=".repeat(40))
    }
}

/// Reads the loader input, which must be a JSON array.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid JSON, or does
/// not hold an array at the top level.
pub(crate) fn read_entries(path: &Path) -> Result<Vec<Value>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            bail!("File not found: {}", path.display())
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read {}", path.display()));
        }
    };
    let document: Value = serde_json::from_str(&contents).context("Invalid JSON")?;
    match document {
        Value::Array(entries) => Ok(entries),
        other => bail!("Expected JSON array, got {}", restaurant::json_type(&other)),
    }
}

/// Validates and inserts `entries` one at a time, in order.
///
/// Invalid entries are logged and counted; processing continues with the
/// next one.
///
/// # Errors
///
/// Returns an error if the store fails, which aborts the load.
pub(crate) fn load_entries(db: &Database, entries: &[Value]) -> Result<LoadStats> {
    let mut stats = LoadStats {
        total: entries.len(),
        ..LoadStats::default()
    };
    info!("Found {} entries", stats.total);

    for (index, entry) in entries.iter().enumerate() {
        let restaurant = match restaurant::validate(index, entry) {
            Ok(restaurant) => restaurant,
            Err(invalid) => {
                stats.invalid += 1;
                log_invalid(&invalid);
                continue;
            }
        };

        if db.insert_restaurant(&restaurant)? {
            stats.inserted += 1;
            info!("Inserted: {}", restaurant.name);
        } else {
            stats.skipped += 1;
            info!(
                "Skipped (exists): {} at {}",
                restaurant.name, restaurant.address
            );
        }
    }
    Ok(stats)
}

fn log_invalid(invalid: &InvalidRecord) {
    error!("INVALID ENTRY at index {}", invalid.index);
    let data = serde_json::to_string_pretty(&invalid.data).unwrap_or_default();
    error!("Data: {data}");
    if !invalid.missing_fields.is_empty() {
        error!("Missing fields: {:?}", invalid.missing_fields);
    }
    if !invalid.extra_fields.is_empty() {
        error!("Extra fields: {:?}", invalid.extra_fields);
    }
    for e in &invalid.errors {
        error!("Validation: {e}");
    }
}
