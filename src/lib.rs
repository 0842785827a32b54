//! # slirc-client
//!
//! An async IRC client engine built on Tokio.
//!
//! ## Features
//!
//! - Line framing that survives reads splitting a line anywhere
//! - Message parsing with prefix splitting and numeric name resolution
//! - Flood-controlled outbound queue with an immediate path for PONG
//! - Keep-alive when the server goes quiet
//! - Bounded auto-rejoin after kicks
//! - WHOIS replies aggregated into one record per lookup
//! - Plaintext or TLS transport
//! - Typed events over a broadcast channel plus synchronous handlers

#![deny(clippy::all)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! ## Quick Start
//!
//! ```no_run
//! use slirc_client::{Client, ConnectionConfig, Event};
//!
//! # async fn run() -> Result<(), slirc_client::ClientError> {
//! let client = Client::new();
//! let mut events = client.subscribe();
//!
//! client.set_credentials("nova", "novabot", None)?;
//! client
//!     .connect(ConnectionConfig::new("irc.libera.chat", 6697).with_ssl(true))
//!     .await?;
//! client.join_channel("#rust", None)?;
//!
//! while let Ok(event) = events.recv().await {
//!     if let Event::ChannelMessage(msg) = event {
//!         if msg.content == "!ping" {
//!             client.send_message(&msg.target, "pong", None)?;
//!         }
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Parsing IRC Messages
//!
//! ```rust
//! use slirc_client::Message;
//!
//! let message: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
//! assert_eq!(message.nick.as_deref(), Some("nick"));
//! assert_eq!(message.params, vec!["#channel", "Hello!"]);
//! ```

pub mod casemap;
pub mod client;
pub mod colors;
pub mod config;
pub mod error;
pub mod event;
pub mod line;
pub mod message;
pub mod prefix;
pub mod response;
pub mod transport;
pub mod util;

pub use self::casemap::{irc_eq, irc_to_lower};
pub use self::client::{Client, RejoinState, WhoisRecord};
pub use self::colors::{Color, FormattedStringExt};
pub use self::config::{ConnectionConfig, Credentials};
pub use self::error::{ClientError, ConfigError, MessageParseError, WhoisError};
pub use self::event::{ChatMessage, ErrorKind, Event, EventHandler, ModeDirection};
pub use self::line::{LineCodec, MAX_IRC_LINE_LEN};
pub use self::message::Message;
pub use self::prefix::Prefix;
pub use self::response::{CommandKind, Response};
pub use self::transport::Transport;
