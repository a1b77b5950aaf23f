//! HTTP client for the homework status endpoint.
//!
//! Sends `GET <endpoint>?from_date=<cursor>` with an `OAuth` authorization
//! header and decodes the body as JSON. Transport failures, non-2xx statuses
//! and unparseable bodies each map to their own error kind; there are no
//! retries here, the poll loop simply tries again next interval.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use super::{PollCursor, StatusSource};
use crate::error::{Error, Result};

/// Longest response body excerpt kept in logs for non-2xx replies.
const BODY_EXCERPT_LEN: usize = 200;

/// Polls the homework status endpoint.
pub struct StatusClient {
    endpoint: String,
    token: String,
    /// HTTP client, reused across polls for connection pooling.
    client: reqwest::Client,
}

impl StatusClient {
    /// Build a client with a bounded per-request timeout.
    pub fn new(
        endpoint: impl Into<String>,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            token: token.into(),
            client,
        })
    }
}

#[async_trait]
impl StatusSource for StatusClient {
    fn name(&self) -> &str {
        "practicum"
    }

    async fn fetch(&self, cursor: PollCursor) -> Result<serde_json::Value> {
        debug!(endpoint = %self.endpoint, from_date = cursor.epoch_secs(), "requesting statuses");

        let response = self
            .client
            .get(&self.endpoint)
            .header(AUTHORIZATION, format!("OAuth {}", self.token))
            .query(&[("from_date", cursor.epoch_secs())])
            .send()
            .await
            .map_err(|e| Error::EndpointUnreachable(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable>".to_string());
            let excerpt: String = body.chars().take(BODY_EXCERPT_LEN).collect();
            warn!(%status, body = %excerpt, "status endpoint returned an error status");
            return Err(Error::UnexpectedStatusCode(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::EndpointUnreachable(Box::new(e)))?;

        serde_json::from_slice(&body).map_err(|e| Error::MalformedPayload(e.to_string()))
    }
}
