//! Parsed IRC messages.
//!
//! A [`Message`] is produced for every inbound line and discarded after
//! dispatch. Besides the raw pieces it carries the resolved command name and
//! [`CommandKind`] from the numeric table, and the prefix split into
//! nick/user/host or server.

mod nom_parser;

use std::str::FromStr;

pub use self::nom_parser::ParsedLine;

use crate::error::MessageParseError;
use crate::prefix::Prefix;
use crate::response::{self, CommandKind, Response};

/// One parsed protocol line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    /// Raw prefix without the leading `:`.
    pub prefix: Option<String>,
    /// Nickname, when the prefix is a user mask.
    pub nick: Option<String>,
    /// Username, when the prefix is a full user mask.
    pub user: Option<String>,
    /// Hostname, when the prefix is a full user mask.
    pub host: Option<String>,
    /// Server name, when the prefix is not a user mask.
    pub server: Option<String>,
    /// Command token exactly as received (`PRIVMSG`, `318`, ...).
    pub raw_command: String,
    /// Resolved command name (`PRIVMSG`, `RPL_ENDOFWHOIS`, ...).
    pub command: String,
    /// Typed numeric, when the command is a known reply.
    pub response: Option<Response>,
    /// Whether the command is an error reply.
    pub kind: CommandKind,
    /// Ordered parameters; the last may be the trailing parameter.
    pub params: Vec<String>,
}

impl Message {
    /// Parse a single line (without its CRLF).
    pub fn parse(line: &str) -> Result<Self, MessageParseError> {
        let parsed = ParsedLine::parse(line)?;
        let (response, command, kind) = response::resolve(parsed.command);

        let mut message = Message {
            prefix: parsed.prefix.map(str::to_string),
            nick: None,
            user: None,
            host: None,
            server: None,
            raw_command: parsed.command.to_string(),
            command,
            response,
            kind,
            params: parsed.params.into_iter().map(str::to_string).collect(),
        };

        match parsed.prefix.map(Prefix::new_from_str) {
            Some(Prefix::User { nick, user, host }) => {
                message.nick = Some(nick);
                message.user = user;
                message.host = host;
            }
            Some(Prefix::Server(name)) => message.server = Some(name),
            None => {}
        }

        Ok(message)
    }

    /// Parameter at `index`, if present.
    #[inline]
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }

    /// The last parameter (usually the trailing text).
    #[inline]
    pub fn trailing(&self) -> Option<&str> {
        self.params.last().map(String::as_str)
    }

    /// Nickname of the sender, or an empty string for server-originated lines.
    pub fn source_nick(&self) -> &str {
        self.nick.as_deref().unwrap_or_default()
    }

    /// Check if this message is an error reply or the `ERROR` command.
    pub fn is_error(&self) -> bool {
        self.kind == CommandKind::Error || self.command == "ERROR"
    }
}

impl FromStr for Message {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Message::parse(s)
    }
}
