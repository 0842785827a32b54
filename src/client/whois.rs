//! WHOIS reply correlation.
//!
//! A WHOIS answer arrives as a burst of numerics (311, 312, 319, 317, 313,
//! 307) closed by 318, or a single 401. Each pending request is keyed by the
//! case-folded target nickname and every reply is routed by the nickname in
//! its second parameter, so lookups for different nicknames can overlap.
//! Only one request per nickname may be outstanding.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace};

use crate::casemap::irc_to_lower;
use crate::error::WhoisError;
use crate::message::Message;
use crate::response::Response;

/// Everything learned about one nickname.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WhoisRecord {
    pub nick: String,
    pub username: Option<String>,
    pub host: Option<String>,
    pub realname: Option<String>,
    pub server: Option<String>,
    pub server_info: Option<String>,
    pub idle_secs: Option<u64>,
    pub signon: Option<DateTime<Utc>>,
    pub channels: Vec<String>,
    pub operator: bool,
    pub registered: bool,
}

pub type WhoisResult = Result<WhoisRecord, WhoisError>;

struct Pending {
    id: u64,
    record: WhoisRecord,
    reply: oneshot::Sender<WhoisResult>,
}

/// Handle for one outstanding lookup.
#[derive(Debug)]
pub struct WhoisTicket {
    pub id: u64,
    pub receiver: oneshot::Receiver<WhoisResult>,
}

#[derive(Default)]
pub struct WhoisCoordinator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<String, Pending>>,
}

impl WhoisCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a lookup for `nick`. The caller sends the WHOIS command.
    pub fn begin(&self, nick: &str) -> Result<WhoisTicket, WhoisError> {
        let key = irc_to_lower(nick);
        let mut pending = self.pending.lock();
        if pending.contains_key(&key) {
            return Err(WhoisError::AlreadyPending(nick.to_string()));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, receiver) = oneshot::channel();
        pending.insert(
            key,
            Pending {
                id,
                record: WhoisRecord {
                    nick: nick.to_string(),
                    ..WhoisRecord::default()
                },
                reply,
            },
        );
        debug!(%nick, id, "whois started");
        Ok(WhoisTicket { id, receiver })
    }

    /// Fail the lookup for `nick` with [`WhoisError::Cancelled`], e.g. when
    /// its WHOIS command was dropped unsent.
    pub fn cancel(&self, nick: &str) -> bool {
        let Some(done) = self.pending.lock().remove(&irc_to_lower(nick)) else {
            return false;
        };
        debug!(%nick, id = done.id, "whois cancelled");
        let _ = done.reply.send(Err(WhoisError::Cancelled(done.record.nick)));
        true
    }

    pub fn is_pending(&self, nick: &str) -> bool {
        self.pending.lock().contains_key(&irc_to_lower(nick))
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply one inbound reply.
    ///
    /// Returns the finished record when `message` is the end-of-whois for a
    /// pending lookup.
    pub fn feed(&self, message: &Message) -> Option<WhoisRecord> {
        let response = message.response?;
        let nick = message.param(1)?;
        let key = irc_to_lower(nick);
        let mut pending = self.pending.lock();

        match response {
            Response::RPL_ENDOFWHOIS => {
                let done = pending.remove(&key)?;
                debug!(nick = %done.record.nick, id = done.id, "whois complete");
                // The caller may have stopped listening.
                let _ = done.reply.send(Ok(done.record.clone()));
                Some(done.record)
            }
            Response::ERR_NOSUCHNICK => {
                let done = pending.remove(&key)?;
                debug!(%nick, id = done.id, "whois failed: no such nick");
                let _ = done.reply.send(Err(WhoisError::NoSuchNick(done.record.nick)));
                None
            }
            _ => {
                let entry = pending.get_mut(&key)?;
                trace!(%nick, reply = %response.name(), "whois reply");
                apply(&mut entry.record, response, message);
                None
            }
        }
    }

    /// Fail every outstanding lookup with [`WhoisError::Disconnected`].
    pub fn fail_all(&self) {
        let drained: Vec<Pending> = self.pending.lock().drain().map(|(_, p)| p).collect();
        for p in drained {
            let _ = p.reply.send(Err(WhoisError::Disconnected(p.record.nick)));
        }
    }
}

fn owned(message: &Message, index: usize) -> Option<String> {
    message.param(index).map(str::to_string)
}

fn apply(record: &mut WhoisRecord, response: Response, message: &Message) {
    match response {
        // <me> <nick> <user> <host> * :<realname>
        Response::RPL_WHOISUSER => {
            if let Some(nick) = message.param(1) {
                record.nick = nick.to_string();
            }
            record.username = owned(message, 2);
            record.host = owned(message, 3);
            record.realname = owned(message, 5);
        }
        // <me> <nick> <server> :<info>
        Response::RPL_WHOISSERVER => {
            record.server = owned(message, 2);
            record.server_info = owned(message, 3);
        }
        // <me> <nick> :<channels>; may be split over several lines
        Response::RPL_WHOISCHANNELS => {
            if let Some(list) = message.param(2) {
                record
                    .channels
                    .extend(list.split_whitespace().map(str::to_string));
            }
        }
        // <me> <nick> <idle> [<signon>] :seconds idle
        Response::RPL_WHOISIDLE => {
            record.idle_secs = message.param(2).and_then(|s| s.parse().ok());
            record.signon = message
                .param(3)
                .and_then(|s| s.parse::<i64>().ok())
                .and_then(|secs| Utc.timestamp_opt(secs, 0).single());
        }
        Response::RPL_WHOISOPERATOR => record.operator = true,
        Response::RPL_WHOISREGNICK => record.registered = true,
        _ => {}
    }
}
