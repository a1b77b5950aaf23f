//! Crate-wide error type.
//!
//! Every failure the relay can hit lives here. Only the configuration kinds
//! are fatal; everything else is caught by the poll loop and turned into a
//! `Failure: ...` notification.

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("missing required environment variables: {}", .0.join(", "))]
    ConfigMissing(Vec<&'static str>),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("status endpoint unreachable: {0}")]
    EndpointUnreachable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("status endpoint returned HTTP {0}")]
    UnexpectedStatusCode(u16),

    #[error("response body is not valid JSON: {0}")]
    MalformedPayload(String),

    #[error("unexpected response shape: {0}")]
    ShapeMismatch(String),

    #[error("response entry is missing field \"{0}\"")]
    MissingField(String),

    #[error("unrecognized review status \"{0}\"")]
    UnrecognizedStatus(String),

    #[error("notification delivery failed: {0}")]
    NotifierFailure(String),
}

impl Error {
    pub fn shape(msg: impl Into<String>) -> Self {
        Self::ShapeMismatch(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn notifier(msg: impl Into<String>) -> Self {
        Self::NotifierFailure(msg.into())
    }
}
