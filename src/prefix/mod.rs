//! IRC message prefix (source) types.

use std::fmt;

/// Origin of a message: a user mask or a server name.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Prefix {
    /// `nick[!user@host]`
    User {
        /// Nickname part.
        nick: String,
        /// Username (ident), when the full mask was sent.
        user: Option<String>,
        /// Hostname, when the full mask was sent.
        host: Option<String>,
    },
    /// Anything that is not shaped like a user mask.
    Server(String),
}

/// Characters allowed in the nickname part of a user prefix.
fn is_nick_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "_-[]\\`^{}|~".contains(c)
}

impl Prefix {
    /// Classify a raw prefix string.
    ///
    /// A prefix is a user if the part before `!` consists solely of nickname
    /// characters and, when `!` is present, it is followed by `user@host`
    /// with a non-empty user. Everything else (e.g. `irc.example.net`) is a
    /// server name.
    pub fn new_from_str(s: &str) -> Prefix {
        let (nick, mask) = match s.split_once('!') {
            Some((nick, rest)) => (nick, Some(rest)),
            None => (s, None),
        };

        if !nick.chars().all(is_nick_char) {
            return Prefix::Server(s.to_string());
        }

        match mask {
            None => Prefix::User {
                nick: nick.to_string(),
                user: None,
                host: None,
            },
            Some(rest) => match rest.split_once('@') {
                Some((user, host)) if !user.is_empty() => Prefix::User {
                    nick: nick.to_string(),
                    user: Some(user.to_string()),
                    host: Some(host.to_string()),
                },
                _ => Prefix::Server(s.to_string()),
            },
        }
    }

    /// Nickname, for user prefixes.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::User { nick, .. } => Some(nick),
            Prefix::Server(_) => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::User { nick, user, host } => {
                f.write_str(nick)?;
                if let (Some(user), Some(host)) = (user, host) {
                    write!(f, "!{}@{}", user, host)?;
                }
                Ok(())
            }
            Prefix::Server(name) => f.write_str(name),
        }
    }
}
