//! Review status codes and the verdict text derived from them.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::{Error, Result};

pub const NAME_FIELD: &str = "homework_name";
pub const STATUS_FIELD: &str = "status";

/// The closed set of review states the endpoint reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// Taken for review; spelled `reviewing` on the wire.
    Pending,
    Approved,
    Rejected,
}

impl StatusCode {
    pub fn as_wire(&self) -> &'static str {
        match self {
            Self::Pending => "reviewing",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }

    /// Fixed human text for this state.
    pub fn human_text(&self) -> &'static str {
        match self {
            Self::Pending => "The work has been taken for review by the reviewer.",
            Self::Approved => "The work has been reviewed: the reviewer liked everything. Hooray!",
            Self::Rejected => "The work has been reviewed: the reviewer has comments.",
        }
    }
}

impl FromStr for StatusCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "reviewing" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(Error::UnrecognizedStatus(other.to_string())),
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

/// One decoded entry of the status list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub subject_name: String,
    pub status_code: StatusCode,
}

impl StatusRecord {
    /// Decode an entry. Both fields are required; the status must be known.
    pub fn from_entry(entry: &Value) -> Result<Self> {
        let subject_name = entry
            .get(NAME_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| Error::MissingField(NAME_FIELD.to_string()))?;

        let status_code = match entry.get(STATUS_FIELD) {
            None | Some(Value::Null) => return Err(Error::MissingField(STATUS_FIELD.to_string())),
            Some(Value::String(code)) => code.parse::<StatusCode>()?,
            Some(other) => return Err(Error::UnrecognizedStatus(other.to_string())),
        };

        Ok(Self {
            subject_name: subject_name.to_string(),
            status_code,
        })
    }

    pub fn verdict(&self) -> Verdict {
        Verdict(format!(
            "Changed status for \"{}\". {}",
            self.subject_name,
            self.status_code.human_text()
        ))
    }
}

/// Notification text for a status change.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Verdict(String);

impl Verdict {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map one status entry to its verdict.
pub fn interpret(entry: &Value) -> Result<Verdict> {
    StatusRecord::from_entry(entry).map(|record| record.verdict())
}
