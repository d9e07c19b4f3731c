use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::GuardPolicy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Which key-value backend holds the bot's durable state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process memory only; everything is lost on exit.
    Memory,
    /// A single JSON file on local disk.
    File { path: PathBuf },
    /// Upstash Redis REST; URL and token come from the environment.
    Upstash,
}

/// Store keys the bot reads and writes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StoreKeys {
    /// Key of the credentials record.
    pub creds: String,
    /// Key of the participant list.
    pub participants: String,
    /// Prefix of session key entries, `<prefix>:<category>:<id>`.
    pub key_prefix: String,
}

impl Default for StoreKeys {
    fn default() -> Self {
        Self {
            creds: "baileys_auth_creds".into(),
            participants: "draw_participants".into(),
            key_prefix: "baileys_auth_keys".into(),
        }
    }
}

/// Bounded exponential backoff between connection attempts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReconnectPolicy {
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Consecutive failed attempts before giving up.
    pub max_attempts: u32,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            max_attempts: 10,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before retry number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.saturating_sub(1).min(32);
        let millis = self
            .initial_backoff_ms
            .saturating_mul(1u64 << shift)
            .min(self.max_backoff_ms);
        Duration::from_millis(millis)
    }
}

/// Runtime configuration for the giveaway bot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BotConfig {
    pub store: StoreBackend,
    pub keys: StoreKeys,
    /// Per-call store timeout.
    pub store_timeout_ms: u64,
    /// Total attempts per store write; 1 disables retry.
    pub store_write_attempts: u32,
    pub store_retry_backoff_ms: u64,
    /// Consecutive store failures before health reports degraded.
    pub degraded_after: u64,
    pub reconnect: ReconnectPolicy,
    /// Prefix that marks a join message, `@` by default.
    pub join_marker: String,
    /// Command that triggers a draw.
    pub draw_command: String,
    /// Phone numbers allowed to run the draw.
    pub admins: Vec<String>,
    /// Whether the bot's own number may run the draw.
    pub self_is_admin: bool,
    /// Name shown on the linked-devices screen.
    pub device_name: String,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            store: StoreBackend::Memory,
            keys: StoreKeys::default(),
            store_timeout_ms: 5_000,
            store_write_attempts: 1,
            store_retry_backoff_ms: 200,
            degraded_after: 3,
            reconnect: ReconnectPolicy::default(),
            join_marker: "@".into(),
            draw_command: "!sortear".into(),
            admins: Vec::new(),
            self_is_admin: true,
            device_name: "wa-giveaway".into(),
        }
    }
}

impl BotConfig {
    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: BotConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.join_marker.trim().is_empty() {
            return Err(ConfigError::Invalid("join_marker must not be empty".into()));
        }
        if self.draw_command.trim().is_empty() {
            return Err(ConfigError::Invalid("draw_command must not be empty".into()));
        }
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::Invalid("store_timeout_ms must be positive".into()));
        }
        if self.store_write_attempts == 0 {
            return Err(ConfigError::Invalid(
                "store_write_attempts must be at least 1".into(),
            ));
        }
        if self.reconnect.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "reconnect.max_attempts must be at least 1".into(),
            ));
        }
        if self.reconnect.initial_backoff_ms > self.reconnect.max_backoff_ms {
            return Err(ConfigError::Invalid(
                "reconnect.initial_backoff_ms exceeds max_backoff_ms".into(),
            ));
        }
        Ok(())
    }

    /// Guard settings derived from the store fields.
    pub fn guard_policy(&self) -> GuardPolicy {
        GuardPolicy {
            timeout: Duration::from_millis(self.store_timeout_ms),
            write_attempts: self.store_write_attempts.max(1),
            retry_backoff: Duration::from_millis(self.store_retry_backoff_ms),
            degraded_after: self.degraded_after.max(1),
        }
    }

    pub fn with_store(mut self, store: StoreBackend) -> Self {
        self.store = store;
        self
    }

    pub fn with_keys(mut self, keys: StoreKeys) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Override total attempts per store write.
    pub fn with_store_write_attempts(mut self, attempts: u32) -> Self {
        self.store_write_attempts = attempts;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Add a phone number to the draw allowlist.
    pub fn with_admin(mut self, number: impl Into<String>) -> Self {
        let number = number.into();
        if !self.admins.contains(&number) {
            self.admins.push(number);
        }
        self
    }

    pub fn with_self_is_admin(mut self, enabled: bool) -> Self {
        self.self_is_admin = enabled;
        self
    }

    pub fn with_join_marker(mut self, marker: impl Into<String>) -> Self {
        self.join_marker = marker.into();
        self
    }

    pub fn with_draw_command(mut self, command: impl Into<String>) -> Self {
        self.draw_command = command.into();
        self
    }

    pub fn with_device_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = name.into();
        self
    }
}
