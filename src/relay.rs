//! The poll loop: fetch, validate, interpret, gate, notify, sleep. Forever.
//!
//! One iteration never ends the loop. Whatever goes wrong while fetching or
//! decoding is rendered as `Failure: <cause>` and sent through the same gate
//! as status changes, so repeated identical failures are announced once.

use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::channel::{Notifier, OutboundMessage};
use crate::config::{Credentials, RelayConfig};
use crate::error::{Error, Result};
use crate::gate::{Candidate, GateOutcome, NotificationGate, NotificationHistory};
use crate::status::validate::validate;
use crate::status::verdict::interpret;
use crate::status::{PollCursor, StatusSource};

/// Sent when the endpoint reports no new entries.
pub const WAITING_TEXT: &str = "Waiting for a new submission to be reviewed...";

/// Format of the optional timestamp prefix on delivered verdicts.
const STAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Loop settings that do not change while it runs.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Destination for every notification.
    pub chat_id: String,
    pub poll_interval: Duration,
    /// Bound on a single delivery; exceeding it counts as a failed delivery.
    pub send_timeout: Duration,
    /// Prefix verdicts with the server watermark time.
    pub stamp_messages: bool,
}

impl RelaySettings {
    pub fn from_config(config: &RelayConfig, credentials: &Credentials) -> Self {
        Self {
            chat_id: credentials.chat_id.clone(),
            poll_interval: config.poll_interval(),
            send_timeout: config.send_timeout(),
            stamp_messages: config.stamp_messages,
        }
    }
}

/// What one iteration did.
#[derive(Debug)]
pub struct TickReport {
    pub candidate: Candidate,
    pub outcome: GateOutcome,
    /// Cursor after the iteration.
    pub cursor: PollCursor,
}

/// Owns the cursor and the notification history for the life of the process.
pub struct Relay {
    source: Box<dyn StatusSource>,
    notifier: Box<dyn Notifier>,
    settings: RelaySettings,
    cursor: PollCursor,
    gate: NotificationGate,
}

impl Relay {
    pub fn new(
        source: Box<dyn StatusSource>,
        notifier: Box<dyn Notifier>,
        settings: RelaySettings,
        cursor: PollCursor,
    ) -> Self {
        Self {
            source,
            notifier,
            settings,
            cursor,
            gate: NotificationGate::new(),
        }
    }

    pub fn cursor(&self) -> PollCursor {
        self.cursor
    }

    pub fn history(&self) -> &NotificationHistory {
        self.gate.history()
    }

    /// Tick, then sleep the poll interval, indefinitely.
    pub async fn run(mut self) {
        info!(
            source = self.source.name(),
            notifier = self.notifier.name(),
            interval_secs = self.settings.poll_interval.as_secs(),
            cursor = %self.cursor,
            "relay started"
        );

        loop {
            let report = self.tick().await;
            debug!(outcome = %report.outcome, cursor = %report.cursor, "iteration finished");
            sleep(self.settings.poll_interval).await;
        }
    }

    /// Run one iteration. Never fails: errors become error candidates.
    pub async fn tick(&mut self) -> TickReport {
        let candidate = match self.poll().await {
            Ok(candidate) => candidate,
            Err(e) => {
                warn!(error = %e, cursor = %self.cursor, "poll failed");
                Candidate::failure(&e)
            }
        };

        let outcome = self.offer(candidate.clone()).await;
        TickReport {
            candidate,
            outcome,
            cursor: self.cursor,
        }
    }

    /// Fetch and decode. The cursor is committed only once the whole response
    /// was understood, so a failure re-queries from the same watermark.
    async fn poll(&mut self) -> Result<Candidate> {
        let payload = self.source.fetch(self.cursor).await?;
        let response = validate(&payload)?;

        let ignored = response.ignored_entries();
        if ignored > 0 {
            debug!(ignored, "only the first entry is reported");
        }
        let verdict = response.first_entry().map(interpret).transpose()?;

        let previous = self.cursor;
        if self.cursor.advance(response.watermark()) {
            info!(from = %previous, to = %self.cursor, "cursor advanced");
        }

        let candidate = match verdict {
            Some(verdict) => {
                info!(%verdict, "status received");
                let candidate = Candidate::status(verdict.into_string());
                match self.stamp() {
                    Some(stamp) => candidate.with_prefix(&stamp),
                    None => candidate,
                }
            }
            None => {
                debug!("no new entries");
                Candidate::status(WAITING_TEXT)
            }
        };

        Ok(candidate)
    }

    fn stamp(&self) -> Option<String> {
        if !self.settings.stamp_messages {
            return None;
        }
        self.cursor
            .as_datetime()
            .map(|at| format!("[{}]", at.format(STAMP_FORMAT)))
    }

    /// Pass the candidate through the gate and deliver it if wanted.
    async fn offer(&mut self, candidate: Candidate) -> GateOutcome {
        if !self.gate.should_send(&candidate) {
            debug!(
                text = candidate.text(),
                state = %self.gate.history().state(),
                "suppressed duplicate"
            );
            return GateOutcome::Suppressed;
        }

        match self.deliver(candidate.message()).await {
            Ok(()) => {
                info!(text = candidate.message(), "notification sent");
                self.gate.record_delivered(candidate);
                GateOutcome::Delivered
            }
            Err(e) => {
                error!(error = %e, "notification not delivered");
                GateOutcome::Failed(e)
            }
        }
    }

    async fn deliver(&self, text: &str) -> Result<()> {
        let msg = OutboundMessage::new(self.settings.chat_id.clone(), text);
        match timeout(self.settings.send_timeout, self.notifier.send(&msg)).await {
            Ok(result) => result,
            Err(_) => Err(Error::notifier(format!(
                "{} send timed out after {}s",
                self.notifier.name(),
                self.settings.send_timeout.as_secs()
            ))),
        }
    }
}
