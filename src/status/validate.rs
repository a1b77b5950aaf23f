//! Shape checks on the decoded status payload.
//!
//! A valid payload is an object with a `homeworks` array and a
//! `current_date` watermark. An empty array is not an error: it is the
//! steady state and surfaces as `first_entry() == None`.

use serde_json::Value;

use crate::error::{Error, Result};

pub const ENTRIES_FIELD: &str = "homeworks";
pub const WATERMARK_FIELD: &str = "current_date";

/// Index of the one entry that gets interpreted. The server lists the most
/// recent change first; later entries are ignored.
pub const ENTRY_INDEX: usize = 0;

/// A payload whose shape has been checked. Borrows from the raw payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidatedResponse<'a> {
    entries: &'a [Value],
    watermark: Option<i64>,
}

impl<'a> ValidatedResponse<'a> {
    /// The entry to interpret, or `None` when there is nothing to report.
    pub fn first_entry(&self) -> Option<&'a Value> {
        self.entries.get(ENTRY_INDEX)
    }

    /// Entries past the one that gets reported.
    pub fn ignored_entries(&self) -> usize {
        self.entries.len().saturating_sub(ENTRY_INDEX + 1)
    }

    /// Server watermark. `None` when `current_date` is not an integer.
    pub fn watermark(&self) -> Option<i64> {
        self.watermark
    }
}

/// Check the payload shape before any field is trusted.
pub fn validate(payload: &Value) -> Result<ValidatedResponse<'_>> {
    let Some(object) = payload.as_object() else {
        return Err(Error::shape(format!(
            "expected a JSON object, got {}",
            kind_of(payload)
        )));
    };

    let missing: Vec<&str> = [ENTRIES_FIELD, WATERMARK_FIELD]
        .into_iter()
        .filter(|key| !object.contains_key(*key))
        .collect();
    if !missing.is_empty() {
        return Err(Error::shape(format!(
            "missing required keys: {}",
            missing.join(", ")
        )));
    }

    let entries = match &object[ENTRIES_FIELD] {
        Value::Array(entries) => entries.as_slice(),
        other => {
            return Err(Error::shape(format!(
                "\"{ENTRIES_FIELD}\" is {}, not a list",
                kind_of(other)
            )));
        }
    };

    Ok(ValidatedResponse {
        entries,
        watermark: object[WATERMARK_FIELD].as_i64(),
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
