//! Notification channels (Telegram today).

pub mod telegram;

use async_trait::async_trait;

use crate::error::Result;

/// A message to deliver to a single destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub chat_id: String,
    pub text: String,
}

impl OutboundMessage {
    pub fn new(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: text.into(),
        }
    }
}

/// Delivery capability used by the relay.
///
/// `send` either delivers the whole message or returns
/// [`Error::NotifierFailure`](crate::error::Error::NotifierFailure). It never
/// retries; the caller decides what happens next.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Human-readable name for logging.
    fn name(&self) -> &str;

    async fn send(&self, msg: &OutboundMessage) -> Result<()>;
}
