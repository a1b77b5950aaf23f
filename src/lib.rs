//! review-relay library: the poll loop and its collaborators, exposed for the
//! binary and integration tests.

pub mod channel;
pub mod config;
pub mod error;
pub mod gate;
pub mod relay;
pub mod status;

pub use error::{Error, Result};
