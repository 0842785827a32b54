//! IRC numeric reply resolution.
//!
//! Servers answer most commands with three-digit numerics. The client
//! resolves each numeric it knows to a semantic name (the RFC 2812
//! identifier such as `RPL_WELCOME`) and a [`CommandKind`]; the dispatcher
//! matches on the typed [`Response`] rather than on raw digits.
//!
//! # Reference
//! - RFC 2812: Internet Relay Chat: Client Protocol
//! - Modern IRC documentation: <https://modern.ircdocs.horse/>

#![allow(non_camel_case_types)]

use std::str::FromStr;

/// Whether a command reports success/information or a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CommandKind {
    /// Regular command or informational reply.
    #[default]
    Normal,
    /// Error reply (ERR_*).
    Error,
}

macro_rules! responses {
    ($($(#[$doc:meta])* $variant:ident = $code:literal,)*) => {
        /// IRC server numeric reply known to the client.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u16)]
        #[non_exhaustive]
        pub enum Response {
            $($(#[$doc])* $variant = $code,)*
        }

        impl Response {
            /// Creates a Response from a numeric code.
            pub fn from_code(code: u16) -> Option<Response> {
                match code {
                    $($code => Some(Response::$variant),)*
                    _ => None,
                }
            }

            /// Semantic name, e.g. `RPL_ENDOFWHOIS`.
            pub fn name(&self) -> &'static str {
                match self {
                    $(Response::$variant => stringify!($variant),)*
                }
            }
        }
    };
}

responses! {
    /// 001 - Welcome to the IRC network
    RPL_WELCOME = 1,
    /// 002 - Your host is running version
    RPL_YOURHOST = 2,
    /// 003 - Server creation date
    RPL_CREATED = 3,
    /// 004 - Server info
    RPL_MYINFO = 4,
    /// 005 - Server supported features (ISUPPORT)
    RPL_ISUPPORT = 5,
    /// 042 - Your unique ID
    RPL_YOURID = 42,
    /// 221 - User mode string
    RPL_UMODEIS = 221,
    /// 250 - Highest connection count
    RPL_STATSCONN = 250,
    /// 251 - Luser client count
    RPL_LUSERCLIENT = 251,
    /// 252 - Luser operator count
    RPL_LUSEROP = 252,
    /// 253 - Luser unknown connections
    RPL_LUSERUNKNOWN = 253,
    /// 254 - Luser channel count
    RPL_LUSERCHANNELS = 254,
    /// 255 - Luser local info
    RPL_LUSERME = 255,
    /// 265 - Local users
    RPL_LOCALUSERS = 265,
    /// 266 - Global users
    RPL_GLOBALUSERS = 266,
    /// 301 - User is away
    RPL_AWAY = 301,
    /// 305 - You are no longer marked as away
    RPL_UNAWAY = 305,
    /// 306 - You have been marked as away
    RPL_NOWAWAY = 306,
    /// 307 - WHOIS registered nick
    RPL_WHOISREGNICK = 307,
    /// 311 - WHOIS user info
    RPL_WHOISUSER = 311,
    /// 312 - WHOIS server
    RPL_WHOISSERVER = 312,
    /// 313 - WHOIS operator status
    RPL_WHOISOPERATOR = 313,
    /// 314 - WHOWAS user info
    RPL_WHOWASUSER = 314,
    /// 315 - End of WHO
    RPL_ENDOFWHO = 315,
    /// 317 - WHOIS idle time
    RPL_WHOISIDLE = 317,
    /// 318 - End of WHOIS
    RPL_ENDOFWHOIS = 318,
    /// 319 - WHOIS channels
    RPL_WHOISCHANNELS = 319,
    /// 324 - Channel mode
    RPL_CHANNELMODEIS = 324,
    /// 329 - Channel creation time
    RPL_CREATIONTIME = 329,
    /// 330 - WHOIS account name
    RPL_WHOISACCOUNT = 330,
    /// 331 - No topic set
    RPL_NOTOPIC = 331,
    /// 332 - Channel topic
    RPL_TOPIC = 332,
    /// 333 - Topic set by/time
    RPL_TOPICWHOTIME = 333,
    /// 338 - WHOIS actually (real host)
    RPL_WHOISACTUALLY = 338,
    /// 341 - Inviting user to channel
    RPL_INVITING = 341,
    /// 352 - WHO reply
    RPL_WHOREPLY = 352,
    /// 353 - NAMES reply
    RPL_NAMREPLY = 353,
    /// 366 - End of NAMES
    RPL_ENDOFNAMES = 366,
    /// 367 - Ban list entry
    RPL_BANLIST = 367,
    /// 368 - End of ban list
    RPL_ENDOFBANLIST = 368,
    /// 369 - End of WHOWAS
    RPL_ENDOFWHOWAS = 369,
    /// 372 - MOTD text
    RPL_MOTD = 372,
    /// 375 - MOTD start
    RPL_MOTDSTART = 375,
    /// 376 - End of MOTD
    RPL_ENDOFMOTD = 376,
    /// 378 - WHOIS host
    RPL_WHOISHOST = 378,
    /// 379 - WHOIS modes
    RPL_WHOISMODES = 379,
    /// 396 - Host hidden
    RPL_HOSTHIDDEN = 396,
    /// 400 - Unknown error
    ERR_UNKNOWNERROR = 400,
    /// 401 - No such nick
    ERR_NOSUCHNICK = 401,
    /// 402 - No such server
    ERR_NOSUCHSERVER = 402,
    /// 403 - No such channel
    ERR_NOSUCHCHANNEL = 403,
    /// 404 - Cannot send to channel
    ERR_CANNOTSENDTOCHAN = 404,
    /// 405 - Too many channels
    ERR_TOOMANYCHANNELS = 405,
    /// 406 - Was no such nick
    ERR_WASNOSUCHNICK = 406,
    /// 407 - Too many targets
    ERR_TOOMANYTARGETS = 407,
    /// 409 - No origin
    ERR_NOORIGIN = 409,
    /// 411 - No recipient
    ERR_NORECIPIENT = 411,
    /// 412 - No text to send
    ERR_NOTEXTTOSEND = 412,
    /// 417 - Input too long
    ERR_INPUTTOOLONG = 417,
    /// 421 - Unknown command
    ERR_UNKNOWNCOMMAND = 421,
    /// 422 - No MOTD
    ERR_NOMOTD = 422,
    /// 431 - No nickname given
    ERR_NONICKNAMEGIVEN = 431,
    /// 432 - Erroneous nickname
    ERR_ERRONEOUSNICKNAME = 432,
    /// 433 - Nickname in use
    ERR_NICKNAMEINUSE = 433,
    /// 436 - Nick collision
    ERR_NICKCOLLISION = 436,
    /// 437 - Resource unavailable
    ERR_UNAVAILRESOURCE = 437,
    /// 441 - User not in channel
    ERR_USERNOTINCHANNEL = 441,
    /// 442 - Not on channel
    ERR_NOTONCHANNEL = 442,
    /// 443 - User on channel
    ERR_USERONCHANNEL = 443,
    /// 451 - Not registered
    ERR_NOTREGISTERED = 451,
    /// 461 - Need more params
    ERR_NEEDMOREPARAMS = 461,
    /// 462 - Already registered
    ERR_ALREADYREGISTERED = 462,
    /// 464 - Password mismatch
    ERR_PASSWDMISMATCH = 464,
    /// 465 - You are banned
    ERR_YOUREBANNEDCREEP = 465,
    /// 467 - Key already set
    ERR_KEYSET = 467,
    /// 471 - Channel is full
    ERR_CHANNELISFULL = 471,
    /// 472 - Unknown mode
    ERR_UNKNOWNMODE = 472,
    /// 473 - Invite only channel
    ERR_INVITEONLYCHAN = 473,
    /// 474 - Banned from channel
    ERR_BANNEDFROMCHAN = 474,
    /// 475 - Bad channel key
    ERR_BADCHANNELKEY = 475,
    /// 476 - Bad channel mask
    ERR_BADCHANMASK = 476,
    /// 477 - Need registered nick
    ERR_NEEDREGGEDNICK = 477,
    /// 478 - Ban list full
    ERR_BANLISTFULL = 478,
    /// 481 - No privileges
    ERR_NOPRIVILEGES = 481,
    /// 482 - Channel op privileges needed
    ERR_CHANOPRIVSNEEDED = 482,
    /// 484 - Restricted
    ERR_RESTRICTED = 484,
    /// 501 - Unknown mode flag
    ERR_UMODEUNKNOWNFLAG = 501,
    /// 502 - Users don't match
    ERR_USERSDONTMATCH = 502,
    /// 671 - WHOIS secure connection
    RPL_WHOISSECURE = 671,
    /// 900 - Logged in
    RPL_LOGGEDIN = 900,
    /// 901 - Logged out
    RPL_LOGGEDOUT = 901,
    /// 902 - Nick locked
    ERR_NICKLOCKED = 902,
}

impl Response {
    /// Returns the numeric code as u16
    #[inline]
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is an error reply (4xx, 5xx, or specific error codes)
    #[inline]
    pub fn is_error(&self) -> bool {
        let code = self.code();
        (400..600).contains(&code) || code == 902
    }

    /// Kind reported on the parsed message.
    #[inline]
    pub fn kind(&self) -> CommandKind {
        if self.is_error() {
            CommandKind::Error
        } else {
            CommandKind::Normal
        }
    }

    /// Check if this reply is one the WHOIS coordinator consumes.
    #[inline]
    pub fn is_whois_related(&self) -> bool {
        matches!(
            self,
            Response::RPL_WHOISUSER
                | Response::RPL_WHOISSERVER
                | Response::RPL_WHOISOPERATOR
                | Response::RPL_WHOISIDLE
                | Response::RPL_ENDOFWHOIS
                | Response::RPL_WHOISCHANNELS
                | Response::RPL_WHOISREGNICK
        )
    }
}

impl FromStr for Response {
    type Err = ParseResponseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 3 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ParseResponseError::InvalidFormat);
        }
        let code: u16 = s.parse().map_err(|_| ParseResponseError::InvalidFormat)?;
        Response::from_code(code).ok_or(ParseResponseError::UnknownCode(code))
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:03}", self.code())
    }
}

/// Error when parsing a response code
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ParseResponseError {
    /// The string was not a three-digit number
    InvalidFormat,
    /// The numeric code is not a known response
    UnknownCode(u16),
}

impl std::fmt::Display for ParseResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidFormat => write!(f, "invalid response code format"),
            Self::UnknownCode(code) => write!(f, "unknown response code: {}", code),
        }
    }
}

impl std::error::Error for ParseResponseError {}

/// Resolve a raw command token to its typed numeric, semantic name and kind.
///
/// Unknown numerics and textual commands pass through unchanged with
/// [`CommandKind::Normal`].
pub fn resolve(raw: &str) -> (Option<Response>, String, CommandKind) {
    match raw.parse::<Response>() {
        Ok(response) => (Some(response), response.name().to_string(), response.kind()),
        Err(_) => (None, raw.to_string(), CommandKind::Normal),
    }
}
