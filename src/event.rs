//! Events emitted by the client.
//!
//! Every inbound line may produce zero or more [`Event`]s. They are handed
//! to each registered [`EventHandler`] in registration order and then
//! broadcast to every [`subscribe`](crate::Client::subscribe)r, all before
//! the next line is read.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::client::WhoisRecord;
use crate::message::Message;

/// Sign of a MODE change.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModeDirection {
    /// Mode string starts with `+`.
    Add,
    /// Mode string starts with `-`.
    Remove,
    /// Neither, e.g. a bare list query.
    Unsigned,
}

impl ModeDirection {
    pub fn of(mode: &str) -> Self {
        match mode.chars().next() {
            Some('+') => ModeDirection::Add,
            Some('-') => ModeDirection::Remove,
            _ => ModeDirection::Unsigned,
        }
    }
}

/// What went wrong in an [`Event::Error`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorKind {
    /// The server sent an error numeric or `ERROR`.
    Protocol,
    /// The transport failed.
    Connection,
    /// Invalid credentials or configuration.
    Config,
}

/// PRIVMSG or NOTICE payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatMessage {
    /// Sending nick, or the server name for server notices.
    pub sender: String,
    /// Channel or nickname the line was addressed to.
    pub target: String,
    pub content: String,
    pub raw: Message,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Event {
    /// Transport is open; registration has been queued.
    Connected,
    /// Every inbound line, before parsing.
    Raw { line: String },
    /// The session ended.
    Disconnected,
    Error {
        kind: ErrorKind,
        error: String,
        /// Parsed message for protocol errors.
        message: Option<Message>,
    },
    /// The server pinged us and we answered.
    Ping { server: String },
    /// Any PRIVMSG, emitted before the direct/channel split.
    Message(ChatMessage),
    /// PRIVMSG addressed to our own nickname.
    DirectMessage(ChatMessage),
    /// PRIVMSG addressed to anything else.
    ChannelMessage(ChatMessage),
    Notice(ChatMessage),
    Join {
        user: String,
        channel: String,
        raw: Message,
    },
    Part {
        user: String,
        channel: String,
        reason: Option<String>,
        raw: Message,
    },
    Quit {
        user: String,
        host: Option<String>,
        reason: Option<String>,
        raw: Message,
    },
    Mode {
        direction: ModeDirection,
        /// Nick (or server) that changed the mode.
        user: String,
        /// Channel or nickname whose mode changed.
        target: String,
        mode: String,
        /// Mode arguments, e.g. the nick receiving `+o`.
        affected: Vec<String>,
        raw: Message,
    },
    Kick {
        kicker: String,
        host: Option<String>,
        channel: String,
        kicked: String,
        reason: String,
        raw: Message,
    },
    /// We were kicked from `channel`.
    BotKicked { channel: String },
    /// One RPL_NAMREPLY line.
    Names { channel: String, names: Vec<String> },
    /// One RPL_BANLIST entry.
    Banlist {
        channel: String,
        mask: String,
        set_by: Option<String>,
        set_at: Option<DateTime<Utc>>,
    },
    /// A WHOIS exchange completed.
    Whois(WhoisRecord),
    Motd { user: String, content: String },
    /// Anything without a dedicated event.
    Unknown { command: String, raw: Message },
}

impl Event {
    /// Stable event name, e.g. `"directMessage"` or `"+mode"`.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Connected => "connected",
            Event::Raw { .. } => "raw",
            Event::Disconnected => "disconnected",
            Event::Error { .. } => "error",
            Event::Ping { .. } => "ping",
            Event::Message(_) => "message",
            Event::DirectMessage(_) => "directMessage",
            Event::ChannelMessage(_) => "channelMessage",
            Event::Notice(_) => "notice",
            Event::Join { .. } => "join",
            Event::Part { .. } => "part",
            Event::Quit { .. } => "quit",
            Event::Mode { direction, .. } => match direction {
                ModeDirection::Add => "+mode",
                ModeDirection::Remove => "-mode",
                ModeDirection::Unsigned => "mode",
            },
            Event::Kick { .. } => "kick",
            Event::BotKicked { .. } => "botKicked",
            Event::Names { .. } => "names",
            Event::Banlist { .. } => "banlist",
            Event::Whois(_) => "whois",
            Event::Motd { .. } => "motd",
            Event::Unknown { .. } => "unknown",
        }
    }
}

/// Synchronous observer notified of every event.
///
/// Handlers run on the reader task, so they must not block. A user-info
/// cache is the typical implementor.
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &Event);
}

impl<F> EventHandler for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn on_event(&self, event: &Event) {
        self(event)
    }
}

/// Fan-out to handlers and broadcast subscribers.
pub(crate) struct EventBus {
    sender: broadcast::Sender<Event>,
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            handlers: RwLock::new(Vec::new()),
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.sender.subscribe()
    }

    pub(crate) fn register(&self, handler: Arc<dyn EventHandler>) {
        self.handlers.write().push(handler);
    }

    pub(crate) fn emit(&self, event: Event) {
        // Snapshot so a handler may register another handler.
        let handlers = self.handlers.read().clone();
        for handler in &handlers {
            handler.on_event(&event);
        }
        // No receivers is not an error.
        let _ = self.sender.send(event);
    }
}
