//! Key validation and row reconciliation against a dataset schema.

use std::collections::HashSet;

use crate::error::{Error, Result};

/// Rejects a caller key set that reuses the display-time column name,
/// repeats a key, or contains a blank key.
///
/// Keys carrying a line break are rejected too: the header is a single line.
pub fn validate_keys(keys: &[String], display_time_key: &str) -> Result<()> {
    let mut seen = HashSet::with_capacity(keys.len());
    for key in keys {
        let reserved = key == display_time_key;
        let duplicate = !seen.insert(key.as_str());
        let blank = key.trim().is_empty();
        let multiline = key.contains('\n') || key.contains('\r');
        if reserved || duplicate || blank || multiline {
            return Err(Error::bad_keys(keys));
        }
    }
    Ok(())
}

/// Keys not yet present in `schema`, in the order they were given.
pub fn new_keys(schema: &[String], keys: &[String]) -> Vec<String> {
    keys.iter()
        .filter(|key| !schema.contains(key))
        .cloned()
        .collect()
}

/// Reorders one value row to follow `schema`.
///
/// Columns the row does not mention come out as empty strings, so the result
/// always has `schema.len()` entries.
pub fn order_row(schema: &[String], keys: &[String], values: &[String]) -> Vec<String> {
    schema
        .iter()
        .map(|column| {
            keys.iter()
                .position(|key| key == column)
                .and_then(|idx| values.get(idx))
                .cloned()
                .unwrap_or_default()
        })
        .collect()
}
