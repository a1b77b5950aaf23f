//! Relay configuration.
//!
//! Settings come from an optional TOML file; credentials always come from the
//! environment (a `.env` file in the working directory is honored by the
//! binary before anything is read).
//!
//! ```toml
//! # How often to poll the status endpoint, in seconds (default: 600).
//! poll_interval_secs = 600
//!
//! # Status endpoint (default: the Practicum homework statuses API).
//! endpoint = "https://practicum.yandex.ru/api/user_api/homework_statuses/"
//!
//! # Upper bounds for a single status request and a single delivery.
//! request_timeout_secs = 30
//! send_timeout_secs = 30
//!
//! # Prefix delivered verdicts with the server timestamp.
//! stamp_messages = false
//!
//! # Telegram Bot API base URL.
//! telegram_api_base = "https://api.telegram.org"
//! ```

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::{Error, Result};

pub const PRACTICUM_TOKEN: &str = "PRACTICUM_TOKEN";
pub const TELEGRAM_TOKEN: &str = "TELEGRAM_TOKEN";
pub const TELEGRAM_CHAT_ID: &str = "TELEGRAM_CHAT_ID";

/// Default settings file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "review-relay.toml";

/// Non-secret relay settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RelayConfig {
    /// Seconds to sleep between iterations (default: 600).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Status endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Timeout for one status request (default: 30).
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Timeout for one notification delivery (default: 30).
    #[serde(default = "default_timeout")]
    pub send_timeout_secs: u64,

    /// Prefix delivered verdicts with `[YYYY-MM-DD HH:MM:SS]`.
    #[serde(default)]
    pub stamp_messages: bool,

    /// Telegram Bot API base URL.
    #[serde(default = "default_telegram_api_base")]
    pub telegram_api_base: String,
}

fn default_poll_interval() -> u64 {
    600
}

fn default_endpoint() -> String {
    "https://practicum.yandex.ru/api/user_api/homework_statuses/".into()
}

fn default_timeout() -> u64 {
    30
}

fn default_telegram_api_base() -> String {
    "https://api.telegram.org".into()
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            endpoint: default_endpoint(),
            request_timeout_secs: default_timeout(),
            send_timeout_secs: default_timeout(),
            stamp_messages: false,
            telegram_api_base: default_telegram_api_base(),
        }
    }
}

impl RelayConfig {
    /// Load settings from a TOML file. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| Error::config(format!("failed to read {}: {e}", path.display())))?;
            let config: RelayConfig = toml::from_str(&contents)
                .map_err(|e| Error::config(format!("failed to parse {}: {e}", path.display())))?;
            info!(path = %path.display(), "loaded config");
            config
        } else {
            info!(path = %path.display(), "config file not found, using defaults");
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the loop cannot run with and warn about odd ones.
    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 || self.send_timeout_secs == 0 {
            return Err(Error::config("timeouts must be at least 1 second"));
        }
        if self.endpoint.trim().is_empty() {
            return Err(Error::config("endpoint is empty"));
        }
        if self.poll_interval_secs == 0 {
            warn!("poll_interval_secs is 0, this will poll as fast as possible");
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_secs(self.send_timeout_secs)
    }
}

/// Secrets and the delivery destination, read once at startup.
#[derive(Clone)]
pub struct Credentials {
    pub practicum_token: String,
    pub telegram_token: String,
    pub chat_id: String,
}

impl Credentials {
    /// Read credentials from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read credentials through `lookup`. Empty values count as missing, and
    /// every missing name is reported at once.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut missing = Vec::new();
        let mut fetch = |name: &'static str| match lookup(name) {
            Some(value) if !value.trim().is_empty() => value,
            _ => {
                missing.push(name);
                String::new()
            }
        };

        let practicum_token = fetch(PRACTICUM_TOKEN);
        let telegram_token = fetch(TELEGRAM_TOKEN);
        let chat_id = fetch(TELEGRAM_CHAT_ID);

        if !missing.is_empty() {
            return Err(Error::ConfigMissing(missing));
        }

        Ok(Self {
            practicum_token,
            telegram_token,
            chat_id,
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("practicum_token", &redact(&self.practicum_token))
            .field("telegram_token", &redact(&self.telegram_token))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

/// Show only the last four characters of a secret.
pub fn redact(secret: &str) -> String {
    let count = secret.chars().count();
    if count <= 4 {
        return "****".into();
    }
    let tail: String = secret.chars().skip(count - 4).collect();
    format!("****{tail}")
}
