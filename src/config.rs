//! Connection configuration and credentials.
//!
//! [`ConnectionConfig`] is fixed for the lifetime of one connection attempt;
//! build it with [`ConnectionConfig::new`] and the `with_*` methods, then
//! hand it to [`Client::connect`](crate::Client::connect).

use std::time::Duration;

use crate::colors::Color;
use crate::error::ConfigError;

/// Default flood-protection delay between queued commands.
pub const DEFAULT_FLOOD_DELAY_MS: u64 = 1000;
/// Default keep-alive interval (8 minutes).
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 8 * 60 * 1000;
/// Default settle delay before a requested JOIN is sent.
pub const DEFAULT_JOIN_DELAY_MS: u64 = 2000;
/// Default delay before rejoining after a kick.
pub const DEFAULT_REJOIN_DELAY_MS: u64 = 5000;
/// Default number of rejoin attempts per channel.
pub const DEFAULT_REJOIN_ATTEMPTS: u32 = 3;
/// Default maximum outbound message line length in bytes.
pub const DEFAULT_MAX_LINE_LENGTH: usize = 350;

const MIN_LINE_LENGTH: usize = 8;

/// Settings recognised by `connect`.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ConnectionConfig {
    /// Server hostname or address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Connect over TLS.
    pub ssl: bool,
    /// Verify the server certificate (off by default).
    pub reject_unauthorized: bool,
    /// Color forced onto every outgoing message, overriding per-call colors.
    pub message_color: Option<Color>,
    /// Strip color and style codes from inbound lines before parsing.
    pub strip_colors: bool,
    /// Byte budget for each outgoing message line, color codes included.
    pub max_line_length: usize,
    /// Rejoin attempts after kicks before giving up on a channel.
    pub rejoin_attempts: u32,
    /// Delay before each rejoin, in milliseconds.
    pub rejoin_delay_ms: u64,
    /// Minimum spacing between queued commands, in milliseconds.
    pub flood_delay_ms: u64,
    /// Server silence tolerated before a keep-alive is sent, in milliseconds.
    pub keepalive_interval_ms: u64,
    /// Delay before a JOIN requested through `join_channel`, in milliseconds.
    pub join_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 6667,
            ssl: false,
            reject_unauthorized: false,
            message_color: None,
            strip_colors: true,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            rejoin_attempts: DEFAULT_REJOIN_ATTEMPTS,
            rejoin_delay_ms: DEFAULT_REJOIN_DELAY_MS,
            flood_delay_ms: DEFAULT_FLOOD_DELAY_MS,
            keepalive_interval_ms: DEFAULT_KEEPALIVE_INTERVAL_MS,
            join_delay_ms: DEFAULT_JOIN_DELAY_MS,
        }
    }
}

impl ConnectionConfig {
    /// Config for `host:port` with every other field at its default.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Enable or disable TLS.
    #[must_use]
    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Enable or disable certificate verification.
    #[must_use]
    pub fn with_reject_unauthorized(mut self, verify: bool) -> Self {
        self.reject_unauthorized = verify;
        self
    }

    /// Force a color onto all outgoing messages.
    #[must_use]
    pub fn with_message_color(mut self, color: Option<Color>) -> Self {
        self.message_color = color;
        self
    }

    #[must_use]
    pub fn with_strip_colors(mut self, strip: bool) -> Self {
        self.strip_colors = strip;
        self
    }

    #[must_use]
    pub fn with_max_line_length(mut self, len: usize) -> Self {
        self.max_line_length = len;
        self
    }

    #[must_use]
    pub fn with_rejoin(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.rejoin_attempts = attempts;
        self.rejoin_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn with_flood_delay_ms(mut self, ms: u64) -> Self {
        self.flood_delay_ms = ms;
        self
    }

    #[must_use]
    pub fn with_keepalive_interval_ms(mut self, ms: u64) -> Self {
        self.keepalive_interval_ms = ms;
        self
    }

    #[must_use]
    pub fn with_join_delay_ms(mut self, ms: u64) -> Self {
        self.join_delay_ms = ms;
        self
    }

    /// Check the config for values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(invalid("host", "must not be empty"));
        }
        if self.flood_delay_ms == 0 {
            return Err(invalid("flood_delay_ms", "must be greater than zero"));
        }
        if self.keepalive_interval_ms == 0 {
            return Err(invalid("keepalive_interval_ms", "must be greater than zero"));
        }
        if self.max_line_length < MIN_LINE_LENGTH {
            return Err(invalid(
                "max_line_length",
                format!("must be at least {}", MIN_LINE_LENGTH),
            ));
        }
        Ok(())
    }

    pub fn flood_delay(&self) -> Duration {
        Duration::from_millis(self.flood_delay_ms)
    }

    pub fn keepalive_interval(&self) -> Duration {
        Duration::from_millis(self.keepalive_interval_ms)
    }

    pub fn join_delay(&self) -> Duration {
        Duration::from_millis(self.join_delay_ms)
    }

    pub fn rejoin_delay(&self) -> Duration {
        Duration::from_millis(self.rejoin_delay_ms)
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

/// Identity presented at registration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Credentials {
    pub nickname: String,
    pub username: String,
    /// Sent in `USER`; defaults to the username.
    pub realname: String,
    /// NickServ password, sent as `IDENTIFY` after registration.
    pub password: Option<String>,
}

impl Credentials {
    /// Build credentials, rejecting an empty nickname or username.
    pub fn new(
        nickname: impl Into<String>,
        username: impl Into<String>,
        password: Option<String>,
    ) -> Result<Self, ConfigError> {
        let nickname = nickname.into();
        let username = username.into();
        if nickname.is_empty() {
            return Err(ConfigError::EmptyNickname);
        }
        if username.is_empty() {
            return Err(ConfigError::EmptyUsername);
        }
        Ok(Self {
            realname: username.clone(),
            nickname,
            username,
            password: password.filter(|p| !p.is_empty()),
        })
    }

    #[must_use]
    pub fn with_realname(mut self, realname: impl Into<String>) -> Self {
        self.realname = realname.into();
        self
    }
}
