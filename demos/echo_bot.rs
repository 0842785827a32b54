//! Echo bot example
//!
//! Connects, joins a channel and repeats every `!echo <text>` it sees.
//! `!whois <nick>` prints what the server knows about a user.
//!
//! ```text
//! cargo run --example echo_bot -- irc.libera.chat 6697 '#slirc-test'
//! ```

use std::sync::Arc;

use slirc_client::{Client, Color, ConnectionConfig, Event};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let mut args = std::env::args().skip(1);
    let host = args.next().unwrap_or_else(|| "irc.libera.chat".to_string());
    let port: u16 = args.next().map(|p| p.parse()).transpose()?.unwrap_or(6697);
    let channel = args.next().unwrap_or_else(|| "#slirc-test".to_string());

    let client = Client::new();
    let mut events = client.subscribe();

    client.register_handler(Arc::new(|event: &Event| {
        if let Event::Error { kind, error, .. } = event {
            warn!(?kind, %error, "irc error");
        }
    }));

    client.set_credentials("slirc-echo", "slirc", None)?;
    client
        .connect(
            ConnectionConfig::new(host, port)
                .with_ssl(port == 6697)
                .with_reject_unauthorized(true),
        )
        .await?;
    client.join_channel(&channel, None)?;

    while let Ok(event) = events.recv().await {
        match event {
            Event::ChannelMessage(msg) => {
                if let Some(text) = msg.content.strip_prefix("!echo ") {
                    client.send_message(&msg.target, text, Some(Color::Cyan))?;
                } else if let Some(nick) = msg.content.strip_prefix("!whois ") {
                    let client = client.clone();
                    let nick = nick.trim().to_string();
                    tokio::spawn(async move {
                        match client.whois(&nick).await {
                            Ok(record) => info!(?record, "whois"),
                            Err(e) => warn!(%nick, error = %e, "whois failed"),
                        }
                    });
                } else if msg.content == "!quit" {
                    client.disconnect(Some("asked to leave")).await?;
                }
            }
            Event::BotKicked { channel } => info!(%channel, "kicked"),
            Event::Disconnected => break,
            _ => {}
        }
    }

    Ok(())
}
