//! Notification gate: decides whether a candidate message is worth sending
//! and remembers what was last delivered.
//!
//! History only changes on confirmed delivery. A failed send leaves it as it
//! was, so the same candidate is attempted again the next time it comes up.

use std::fmt;

use crate::error::Error;

/// Whether a candidate reports a status or a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CandidateKind {
    Status,
    Error,
}

/// A message the relay would like to send.
///
/// `text` is what the gate compares; `message` is what actually goes out.
/// They differ only when the message carries a decoration such as a
/// timestamp that must not defeat deduplication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    text: String,
    message: String,
    kind: CandidateKind,
}

impl Candidate {
    pub fn status(text: impl Into<String>) -> Self {
        Self::new(text.into(), CandidateKind::Status)
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self::new(text.into(), CandidateKind::Error)
    }

    /// Error candidate for a failed iteration: `Failure: <cause>`.
    pub fn failure(err: &Error) -> Self {
        Self::error(format!("Failure: {err}"))
    }

    fn new(text: String, kind: CandidateKind) -> Self {
        Self {
            message: text.clone(),
            text,
            kind,
        }
    }

    /// Prefix the outgoing message without changing the compared text.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix} {}", self.text);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_error(&self) -> bool {
        self.kind == CandidateKind::Error
    }
}

/// Gate state, named after what was last delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Idle,
    LastWasStatus,
    LastWasError,
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::LastWasStatus => write!(f, "last-was-status"),
            Self::LastWasError => write!(f, "last-was-error"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum LastSent {
    #[default]
    Nothing,
    Status(String),
    Error(String),
}

/// What was last delivered successfully. In memory only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationHistory {
    last: LastSent,
}

impl NotificationHistory {
    /// Empty text when nothing has been delivered yet.
    pub fn last_sent_text(&self) -> &str {
        match &self.last {
            LastSent::Nothing => "",
            LastSent::Status(text) | LastSent::Error(text) => text.as_str(),
        }
    }

    pub fn last_sent_was_error(&self) -> bool {
        matches!(self.last, LastSent::Error(_))
    }

    pub fn state(&self) -> GateState {
        match self.last {
            LastSent::Nothing => GateState::Idle,
            LastSent::Status(_) => GateState::LastWasStatus,
            LastSent::Error(_) => GateState::LastWasError,
        }
    }
}

/// Result of offering a candidate to the gate.
#[derive(Debug)]
pub enum GateOutcome {
    /// Same as the last delivered text; nothing was sent.
    Suppressed,
    Delivered,
    /// Delivery was attempted and failed; history is unchanged.
    Failed(Error),
}

impl GateOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, Self::Suppressed)
    }
}

impl fmt::Display for GateOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suppressed => write!(f, "suppressed (unchanged)"),
            Self::Delivered => write!(f, "delivered"),
            Self::Failed(e) => write!(f, "failed: {e}"),
        }
    }
}

/// The dedup state machine.
#[derive(Debug, Default)]
pub struct NotificationGate {
    history: NotificationHistory,
}

impl NotificationGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &NotificationHistory {
        &self.history
    }

    /// Whether delivery of `candidate` should be attempted.
    ///
    /// Skips a repeat of the last delivered status text, and a repeat of the
    /// last delivered error. Everything else goes out.
    pub fn should_send(&self, candidate: &Candidate) -> bool {
        match (&self.history.last, candidate.kind) {
            (LastSent::Status(last), _) if *last == candidate.text => false,
            (LastSent::Error(last), CandidateKind::Error) if *last == candidate.text => false,
            _ => true,
        }
    }

    /// Record a confirmed delivery.
    pub fn record_delivered(&mut self, candidate: Candidate) {
        self.history.last = match candidate.kind {
            CandidateKind::Status => LastSent::Status(candidate.text),
            CandidateKind::Error => LastSent::Error(candidate.text),
        };
    }
}
