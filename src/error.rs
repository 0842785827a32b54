//! Error types for the IRC client.
//!
//! This module defines the top-level [`ClientError`] together with the
//! narrower errors for configuration, message parsing and WHOIS lookups.

use thiserror::Error;

/// Convenience type alias for Results using [`ClientError`].
pub type Result<T, E = ClientError> = std::result::Result<T, E>;

/// Top-level client errors.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// I/O error while connecting, reading or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TLS handshake or configuration failure.
    #[error("tls error: {0}")]
    Tls(#[from] tokio_rustls::rustls::Error),

    /// The configured host is not a valid TLS server name.
    #[error("invalid server name: {0}")]
    InvalidServerName(String),

    /// Invalid configuration or credentials.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A WHOIS lookup failed.
    #[error(transparent)]
    Whois(#[from] WhoisError),

    /// The operation needs a live connection.
    #[error("not connected")]
    NotConnected,

    /// `connect` was called while a session is still running.
    #[error("already connected")]
    AlreadyConnected,
}

/// Errors raised while validating configuration or credentials.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    /// Nickname was empty.
    #[error("nickname is required")]
    EmptyNickname,

    /// Username was empty.
    #[error("username is required")]
    EmptyUsername,

    /// `connect` was called before `set_credentials`.
    #[error("credentials must be set before connecting")]
    MissingCredentials,

    /// A configuration field holds an unusable value.
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Errors encountered when parsing an IRC line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum MessageParseError {
    /// Line was empty after trimming.
    #[error("empty message")]
    EmptyMessage,

    /// Line had a prefix but no command.
    #[error("missing command in: {0}")]
    MissingCommand(String),
}

/// Terminal failure of a single WHOIS request.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WhoisError {
    /// The server answered with ERR_NOSUCHNICK (401).
    #[error("no such nickname: {0}")]
    NoSuchNick(String),

    /// A WHOIS for the same nickname is still outstanding.
    #[error("whois for {0} already in flight")]
    AlreadyPending(String),

    /// The WHOIS command was dropped from the outbound queue unsent.
    #[error("whois for {0} cancelled before it was sent")]
    Cancelled(String),

    /// The connection ended before the reply completed.
    #[error("connection closed before whois for {0} completed")]
    Disconnected(String),
}
