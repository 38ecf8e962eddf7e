//! Field-level merge planning for idempotent upserts.
//!
//! An upsert never replaces a whole row. The destination store can hold
//! manually-edited columns outside the synced set, so an update carries
//! only the fields whose value actually changed. Applying the same
//! desired fields twice therefore converges: the second diff is empty.

use serde_json::Value;

/// A set of destination column values, keyed by column name.
pub type FieldMap = serde_json::Map<String, Value>;

/// Compute the minimal update that brings `existing` in line with
/// `desired`.
///
/// Returns the subset of `desired` whose values differ from the stored
/// ones. A column absent from the stored row counts as `null`, so a
/// desired `null` against a missing column produces no write. Columns
/// present in `existing` but not in `desired` are left untouched.
pub fn changed_fields(existing: &FieldMap, desired: &FieldMap) -> FieldMap {
    let mut changes = FieldMap::new();
    for (column, value) in desired {
        let current = existing.get(column).unwrap_or(&Value::Null);
        if current != value {
            changes.insert(column.clone(), value.clone());
        }
    }
    changes
}
