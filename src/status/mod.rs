//! Status endpoint access: the polling source, its cursor, and the decoding
//! pipeline (`validate` then `verdict`).
//!
//! The poll loop only talks to a [`StatusSource`]; the reqwest-backed
//! [`client::StatusClient`] is the production implementation.

pub mod client;
pub mod validate;
pub mod verdict;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;

/// A remote endpoint that can be asked for status changes since a cursor.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    /// Issue one request for changes since `cursor` and return the decoded
    /// JSON body. No retries.
    async fn fetch(&self, cursor: PollCursor) -> Result<serde_json::Value>;
}

/// Watermark sent as `from_date`, in epoch seconds.
///
/// Only moves forward: advancing to an older watermark is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct PollCursor(i64);

impl PollCursor {
    pub fn new(epoch_secs: i64) -> Self {
        Self(epoch_secs)
    }

    /// Cursor at the current wall-clock time.
    pub fn now() -> Self {
        Self(Utc::now().timestamp())
    }

    pub fn epoch_secs(&self) -> i64 {
        self.0
    }

    /// Move to the server-provided watermark, or to wall-clock time when the
    /// server gave none. Returns true if the cursor moved.
    pub fn advance(&mut self, watermark: Option<i64>) -> bool {
        let next = watermark.unwrap_or_else(|| Utc::now().timestamp());
        if next > self.0 {
            self.0 = next;
            true
        } else {
            false
        }
    }

    /// The cursor as a UTC timestamp, if it is in chrono's range.
    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp(self.0, 0)
    }
}

impl fmt::Display for PollCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
