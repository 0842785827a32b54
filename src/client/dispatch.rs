//! Routing of inbound messages to events and session state.

use std::borrow::Cow;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use tracing::{debug, trace, warn};

use super::Session;
use crate::casemap::irc_eq;
use crate::colors::FormattedStringExt;
use crate::event::{ChatMessage, ErrorKind, Event, ModeDirection};
use crate::message::Message;
use crate::response::Response;

/// Informational numerics that produce no event.
fn is_suppressed(response: Response) -> bool {
    matches!(
        response,
        Response::RPL_WELCOME
            | Response::RPL_YOURHOST
            | Response::RPL_CREATED
            | Response::RPL_MYINFO
            | Response::RPL_ISUPPORT
            | Response::RPL_YOURID
            | Response::RPL_STATSCONN
            | Response::RPL_LUSERCLIENT
            | Response::RPL_LUSEROP
            | Response::RPL_LUSERUNKNOWN
            | Response::RPL_LUSERCHANNELS
            | Response::RPL_LUSERME
            | Response::RPL_LOCALUSERS
            | Response::RPL_GLOBALUSERS
            | Response::RPL_ENDOFMOTD
            | Response::RPL_ENDOFNAMES
            | Response::RPL_ENDOFBANLIST
            | Response::RPL_HOSTHIDDEN
            | Response::RPL_WHOISHOST
            | Response::RPL_WHOISACCOUNT
            | Response::RPL_WHOISSECURE
            | Response::RPL_WHOISACTUALLY
    )
}

fn param(message: &Message, index: usize) -> String {
    message.param(index).unwrap_or_default().to_string()
}

/// Sender of a message: the nick, or the server name.
fn sender(message: &Message) -> String {
    message
        .nick
        .as_deref()
        .or(message.server.as_deref())
        .unwrap_or_default()
        .to_string()
}

impl Session {
    pub(super) fn handle_line(self: &Arc<Self>, line: String) {
        trace!("<< {}", line);
        self.events.emit(Event::Raw { line: line.clone() });

        let text = if self.config.strip_colors {
            line.as_str().strip_formatting()
        } else {
            Cow::Borrowed(line.as_str())
        };

        match Message::parse(&text) {
            Ok(message) => self.dispatch(message),
            Err(e) => warn!(error = %e, %line, "dropping unparseable line"),
        }
    }

    pub(super) fn dispatch(self: &Arc<Self>, message: Message) {
        let response = message.response;
        match response {
            Some(response) if is_suppressed(response) => {}
            Some(Response::RPL_MOTDSTART | Response::RPL_MOTD) => {
                self.events.emit(Event::Motd {
                    user: param(&message, 0),
                    content: param(&message, 1),
                });
            }
            Some(response) if response.is_whois_related() => {
                if let Some(record) = self.whois.feed(&message) {
                    self.events.emit(Event::Whois(record));
                }
            }
            Some(Response::ERR_NOSUCHNICK) => {
                self.whois.feed(&message);
                self.emit_protocol_error(message);
            }
            Some(Response::RPL_NAMREPLY) => {
                // <me> <=|*|@> <channel> :<names>
                self.events.emit(Event::Names {
                    channel: param(&message, 2),
                    names: message
                        .param(3)
                        .unwrap_or_default()
                        .split_whitespace()
                        .map(str::to_string)
                        .collect(),
                });
            }
            Some(Response::RPL_BANLIST) => {
                // <me> <channel> <mask> [<set by> <set at>]
                self.events.emit(Event::Banlist {
                    channel: param(&message, 1),
                    mask: param(&message, 2),
                    set_by: message.param(3).map(str::to_string),
                    set_at: message
                        .param(4)
                        .and_then(|s| s.parse::<i64>().ok())
                        .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
                });
            }
            _ => self.dispatch_command(message),
        }
    }

    fn dispatch_command(self: &Arc<Self>, message: Message) {
        match message.command.as_str() {
            "PING" => self.on_ping(&message),
            "PRIVMSG" => self.on_privmsg(message),
            "NOTICE" => {
                let chat = ChatMessage {
                    sender: sender(&message),
                    target: param(&message, 0),
                    content: param(&message, 1),
                    raw: message,
                };
                self.events.emit(Event::Notice(chat));
            }
            "JOIN" => self.on_join(message),
            "PART" => {
                self.events.emit(Event::Part {
                    user: sender(&message),
                    channel: param(&message, 0),
                    reason: message.param(1).map(str::to_string),
                    raw: message,
                });
            }
            "QUIT" => {
                self.events.emit(Event::Quit {
                    user: sender(&message),
                    host: message.host.clone(),
                    reason: message.param(0).map(str::to_string),
                    raw: message,
                });
            }
            "MODE" => {
                let mode = param(&message, 1);
                self.events.emit(Event::Mode {
                    direction: ModeDirection::of(&mode),
                    user: sender(&message),
                    target: param(&message, 0),
                    affected: message.params.iter().skip(2).cloned().collect(),
                    mode,
                    raw: message,
                });
            }
            "KICK" => self.on_kick(message),
            "NICK" => {
                self.on_nick(&message);
                self.emit_unknown(message);
            }
            _ if message.is_error() => self.emit_protocol_error(message),
            _ => self.emit_unknown(message),
        }
    }

    fn on_ping(&self, message: &Message) {
        let server = message
            .param(0)
            .or(message.server.as_deref())
            .unwrap_or_default()
            .to_string();

        if server.is_empty() {
            self.queue.send_immediate("PONG");
        } else {
            self.queue.send_immediate(format!("PONG {}", server));
        }
        self.keepalive.record_ping();
        self.events.emit(Event::Ping { server });
    }

    fn on_privmsg(&self, message: Message) {
        let chat = ChatMessage {
            sender: sender(&message),
            target: param(&message, 0),
            content: param(&message, 1),
            raw: message,
        };
        let direct = irc_eq(&chat.target, &self.nickname());

        self.events.emit(Event::Message(chat.clone()));
        if direct {
            self.events.emit(Event::DirectMessage(chat));
        } else {
            self.events.emit(Event::ChannelMessage(chat));
        }
    }

    fn on_join(self: &Arc<Self>, message: Message) {
        let user = sender(&message);
        let channel = param(&message, 0);
        let own = irc_eq(&user, &self.nickname());

        self.events.emit(Event::Join {
            user: user.clone(),
            channel: channel.clone(),
            raw: message,
        });

        if own {
            self.rejoin.on_joined(&channel);
        } else if !user.is_empty() {
            self.implicit_whois(&user);
        }
    }

    /// Look up a user who just joined; only the `Whois` event is of interest.
    fn implicit_whois(&self, nick: &str) {
        if self.whois.is_pending(nick) {
            return;
        }
        match self.begin_whois(nick) {
            Ok(ticket) => {
                let nick = nick.to_string();
                tokio::spawn(async move {
                    if let Ok(Err(e)) = ticket.receiver.await {
                        debug!(%nick, error = %e, "whois after join failed");
                    }
                });
            }
            Err(e) => debug!(%nick, error = %e, "skipping whois after join"),
        }
    }

    fn on_kick(self: &Arc<Self>, message: Message) {
        let channel = param(&message, 0);
        let kicked = param(&message, 1);
        let own = irc_eq(&kicked, &self.nickname());

        self.events.emit(Event::Kick {
            kicker: sender(&message),
            host: message.host.clone(),
            channel: channel.clone(),
            kicked,
            reason: param(&message, 2),
            raw: message,
        });

        if own {
            warn!(%channel, "kicked from channel");
            self.events.emit(Event::BotKicked {
                channel: channel.clone(),
            });
            if self.rejoin.on_kicked(&channel) {
                self.schedule(self.config.rejoin_delay(), format!("JOIN {}", channel));
            }
        }
    }

    /// Follow server-side changes of our own nickname.
    fn on_nick(&self, message: &Message) {
        let (Some(old), Some(new)) = (message.nick.as_deref(), message.param(0)) else {
            return;
        };
        let mut nickname = self.nickname.write();
        if irc_eq(old, &nickname) {
            debug!(%old, %new, "own nickname changed");
            *nickname = new.to_string();
        }
    }

    fn emit_protocol_error(&self, message: Message) {
        let error = message
            .trailing()
            .map(str::to_string)
            .unwrap_or_else(|| message.command.clone());
        debug!(command = %message.command, %error, "server error reply");
        self.events.emit(Event::Error {
            kind: ErrorKind::Protocol,
            error,
            message: Some(message),
        });
    }

    fn emit_unknown(&self, message: Message) {
        self.events.emit(Event::Unknown {
            command: message.command.clone(),
            raw: message,
        });
    }
}
