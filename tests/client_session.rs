//! End-to-end session tests against a scripted in-memory server.
//!
//! The client runs over one half of a `tokio::io::duplex` pipe; the test
//! plays the server on the other half. Time is paused, so flood, join and
//! rejoin delays elapse instantly while their ordering is preserved.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use slirc_client::{
    Client, ClientError, ConnectionConfig, ErrorKind, Event, LineCodec, ModeDirection,
    RejoinState, WhoisError,
};
use tokio::io::{AsyncRead, AsyncWrite, DuplexStream, ReadBuf};
use tokio::sync::broadcast;
use tokio::time::{timeout, Instant};
use tokio_util::codec::Framed;

const WAIT: Duration = Duration::from_secs(30);

// =============================================================================
// HARNESS
// =============================================================================

struct FakeServer {
    lines: Framed<DuplexStream, LineCodec>,
}

impl FakeServer {
    async fn recv(&mut self) -> String {
        timeout(WAIT, self.lines.next())
            .await
            .expect("client wrote nothing in time")
            .expect("client closed the connection")
            .expect("line decodes")
    }

    async fn send(&mut self, line: &str) {
        self.lines
            .send(line.to_string())
            .await
            .expect("write to client");
    }

    /// Consume NICK and USER.
    async fn registered(&mut self) {
        assert_eq!(self.recv().await, "NICK nova");
        assert_eq!(self.recv().await, "USER novabot 0 * :novabot");
    }

    /// True when the client writes nothing for `quiet`.
    async fn stays_quiet(&mut self, quiet: Duration) -> bool {
        timeout(quiet, self.lines.next()).await.is_err()
    }
}

/// A transport whose writes always fail and whose reads never complete.
struct BrokenPipe;

impl AsyncRead for BrokenPipe {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Poll::Pending
    }
}

impl AsyncWrite for BrokenPipe {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        _buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Poll::Ready(Err(io::ErrorKind::BrokenPipe.into()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn config() -> ConnectionConfig {
    ConnectionConfig::new("irc.test", 6667)
}

fn client_for(password: Option<&str>) -> (Client, broadcast::Receiver<Event>) {
    let client = Client::new();
    let events = client.subscribe();
    client
        .set_credentials("nova", "novabot", password)
        .expect("valid credentials");
    (client, events)
}

fn start_with_buffer(
    config: ConnectionConfig,
    password: Option<&str>,
    buffer: usize,
) -> (Client, broadcast::Receiver<Event>, FakeServer) {
    let (client, events) = client_for(password);
    let (local, remote) = tokio::io::duplex(buffer);
    client
        .connect_with_stream(config, local)
        .expect("session starts");

    let server = FakeServer {
        lines: Framed::new(remote, LineCodec::new()),
    };
    (client, events, server)
}

fn start(
    config: ConnectionConfig,
    password: Option<&str>,
) -> (Client, broadcast::Receiver<Event>, FakeServer) {
    start_with_buffer(config, password, 64 * 1024)
}

async fn wait_for<F>(events: &mut broadcast::Receiver<Event>, mut pred: F) -> Event
where
    F: FnMut(&Event) -> bool,
{
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event channel open");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event not emitted in time")
}

/// Every event up to and including the first one matching `pred`.
async fn events_until<F>(events: &mut broadcast::Receiver<Event>, mut pred: F) -> Vec<Event>
where
    F: FnMut(&Event) -> bool,
{
    let mut seen = Vec::new();
    timeout(WAIT, async {
        loop {
            let event = events.recv().await.expect("event channel open");
            let done = pred(&event);
            seen.push(event);
            if done {
                return;
            }
        }
    })
    .await
    .expect("event not emitted in time");
    seen
}

// =============================================================================
// REGISTRATION AND FLOOD CONTROL
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_registration_order_and_spacing() {
    let (_client, mut events, mut server) = start(config(), Some("hunter2"));

    assert_eq!(events.recv().await.expect("connected"), Event::Connected);

    let mut stamps = Vec::new();
    for expected in [
        "NICK nova",
        "USER novabot 0 * :novabot",
        "PRIVMSG NickServ :IDENTIFY hunter2",
    ] {
        assert_eq!(server.recv().await, expected);
        stamps.push(Instant::now());
    }

    for pair in stamps.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(1));
    }
}

#[tokio::test(start_paused = true)]
async fn test_no_identify_without_password() {
    let (_client, _events, mut server) = start(config(), None);
    server.registered().await;
    assert!(server.stays_quiet(Duration::from_secs(10)).await);
}

#[tokio::test(start_paused = true)]
async fn test_custom_flood_delay() {
    let (client, _events, mut server) = start(config().with_flood_delay_ms(250), None);
    server.registered().await;

    client.send_raw("PRIVMSG #a :one").expect("connected");
    client.send_raw("PRIVMSG #a :two").expect("connected");

    assert_eq!(server.recv().await, "PRIVMSG #a :one");
    let first = Instant::now();
    assert_eq!(server.recv().await, "PRIVMSG #a :two");
    let gap = Instant::now() - first;
    assert!(gap >= Duration::from_millis(250));
    assert!(gap < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn test_spacing_survives_stalled_socket() {
    // Room for less than two lines, so every write waits for the reader.
    let (client, _events, mut server) = start_with_buffer(config(), None, 16);
    for i in 0..5 {
        client
            .send_raw(&format!("PRIVMSG #c :{}", i))
            .expect("connected");
    }

    tokio::time::sleep(Duration::from_secs(10)).await;
    server.registered().await;

    let mut stamps = Vec::new();
    for i in 0..5 {
        assert_eq!(server.recv().await, format!("PRIVMSG #c :{}", i));
        stamps.push(Instant::now());
    }
    for pair in stamps.windows(2) {
        assert!(pair[1] - pair[0] >= Duration::from_secs(1));
    }
}

// =============================================================================
// PING / KEEP-ALIVE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_ping_answered_ahead_of_queue() {
    let (_client, mut events, mut server) = start(config(), None);

    assert_eq!(server.recv().await, "NICK nova");
    server.send("PING :irc.test").await;

    // USER is still waiting out the flood delay.
    assert_eq!(server.recv().await, "PONG irc.test");
    assert_eq!(server.recv().await, "USER novabot 0 * :novabot");

    let event = wait_for(&mut events, |e| matches!(e, Event::Ping { .. })).await;
    assert_eq!(
        event,
        Event::Ping {
            server: "irc.test".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_keepalive_after_silence() {
    let (_client, _events, mut server) = start(config().with_keepalive_interval_ms(10_000), None);
    server.registered().await;

    let started = Instant::now();
    assert_eq!(server.recv().await, "PONG :KeepAlive");
    assert!(Instant::now() - started >= Duration::from_secs(9));
}

#[tokio::test(start_paused = true)]
async fn test_ping_defers_keepalive() {
    let (_client, _events, mut server) = start(config().with_keepalive_interval_ms(10_000), None);
    server.registered().await;

    for _ in 0..4 {
        tokio::time::sleep(Duration::from_secs(4)).await;
        server.send("PING :irc.test").await;
        assert_eq!(server.recv().await, "PONG irc.test");
    }
}

// =============================================================================
// OUTBOUND COMMANDS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_join_waits_for_settle_delay() {
    let (client, _events, mut server) = start(config(), None);
    server.registered().await;

    let asked = Instant::now();
    client
        .join_channel("#rust", Some("sekrit"))
        .expect("connected");
    assert_eq!(server.recv().await, "JOIN #rust sekrit");
    assert!(Instant::now() - asked >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_channel_command_wire_format() {
    let (client, _events, mut server) = start(config(), None);
    server.registered().await;

    client.part("#rust", Some("later")).expect("connected");
    client.part("#tea", None).expect("connected");
    client.kick("#rust", "bob", Some("spam")).expect("connected");
    client.kick("#rust", "eve", None).expect("connected");
    client.ban("#rust", "*!*@bad.host").expect("connected");
    client.banlist("#rust").expect("connected");
    client.names("#rust").expect("connected");

    for expected in [
        "PART #rust :later",
        "PART #tea",
        "KICK #rust bob :spam",
        "KICK #rust eve",
        "MODE #rust +b *!*@bad.host",
        "MODE #rust +b",
        "NAMES #rust",
    ] {
        assert_eq!(server.recv().await, expected);
    }
}

#[tokio::test(start_paused = true)]
async fn test_send_message_splits_long_text() {
    let (client, _events, mut server) = start(config().with_max_line_length(20), None);
    server.registered().await;

    client
        .send_message("#rust", "alpha beta gamma delta epsilon", None)
        .expect("connected");
    assert_eq!(server.recv().await, "PRIVMSG #rust :alpha beta gamma");
    assert_eq!(server.recv().await, "PRIVMSG #rust :delta epsilon");
}

#[tokio::test(start_paused = true)]
async fn test_send_message_never_sends_blank_lines() {
    let (client, _events, mut server) = start(config().with_max_line_length(10), None);
    server.registered().await;

    client
        .send_message("#c", "aaaaaaaaaa  bbbbbbbbbbbb", None)
        .expect("connected");
    client.send_message("#c", "   ", None).expect("connected");

    assert_eq!(server.recv().await, "PRIVMSG #c :aaaaaaaaaa");
    assert_eq!(server.recv().await, "PRIVMSG #c :bbbbbbbbbbbb");
    assert!(server.stays_quiet(Duration::from_secs(10)).await);
}

#[tokio::test(start_paused = true)]
async fn test_clear_queue_drops_unsent_commands() {
    let (client, _events, mut server) = start(config(), None);
    server.registered().await;

    client.send_raw("PRIVMSG #c :one").expect("connected");
    client.send_raw("PRIVMSG #c :two").expect("connected");
    client.clear_queue().expect("connected");
    client.send_raw("PRIVMSG #c :three").expect("connected");

    assert_eq!(server.recv().await, "PRIVMSG #c :three");
}

// =============================================================================
// INBOUND DISPATCH
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_raw_event_carries_unstripped_line() {
    let (_client, mut events, mut server) = start(config(), None);

    server.send(":bob!b@host PRIVMSG #rust :\x0304red\x03").await;

    let raw = wait_for(&mut events, |e| matches!(e, Event::Raw { .. })).await;
    assert_eq!(raw.name(), "raw");
    assert_eq!(
        raw,
        Event::Raw {
            line: ":bob!b@host PRIVMSG #rust :\x0304red\x03".to_string()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_privmsg_routing_and_color_stripping() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":bob!b@host PRIVMSG Nova :psst").await;
    server.send(":bob!b@host PRIVMSG #rust :\x0304,01hey\x03 all").await;

    match wait_for(&mut events, |e| matches!(e, Event::DirectMessage(_))).await {
        Event::DirectMessage(chat) => {
            assert_eq!(chat.sender, "bob");
            assert_eq!(chat.content, "psst");
        }
        other => panic!("unexpected {:?}", other),
    }
    match wait_for(&mut events, |e| matches!(e, Event::ChannelMessage(_))).await {
        Event::ChannelMessage(chat) => {
            assert_eq!(chat.target, "#rust");
            assert_eq!(chat.content, "hey all");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_own_nick_change_is_tracked() {
    let (client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":nova!n@host NICK nova2").await;
    server.send(":bob!b@host PRIVMSG NOVA2 :still there?").await;

    match wait_for(&mut events, |e| matches!(e, Event::Message(_))).await {
        Event::Message(chat) => assert_eq!(chat.content, "still there?"),
        other => panic!("unexpected {:?}", other),
    }
    let next = events.recv().await.expect("event channel open");
    assert_eq!(next.name(), "directMessage");
    assert_eq!(client.nickname().as_deref(), Some("nova2"));
}

#[tokio::test(start_paused = true)]
async fn test_suppressed_numerics_emit_only_raw() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    for line in [
        ":srv 001 nova :Welcome to the test network",
        ":srv 002 nova :Your host is srv",
        ":srv 005 nova CHANTYPES=# :are supported by this server",
        ":srv 251 nova :There are 3 users",
        ":srv 366 nova #rust :End of /NAMES list.",
        ":srv 376 nova :End of /MOTD command.",
        ":srv 368 nova #rust :End of channel ban list",
    ] {
        server.send(line).await;
    }
    server.send(":srv NOTICE nova :done").await;

    let seen = events_until(&mut events, |e| matches!(e, Event::Notice(_))).await;
    let names: Vec<&str> = seen.iter().map(Event::name).collect();
    assert_eq!(names.iter().filter(|n| **n == "raw").count(), 8);
    assert!(names
        .iter()
        .all(|n| matches!(*n, "connected" | "raw" | "notice")));

    match seen.last() {
        Some(Event::Notice(chat)) => {
            assert_eq!(chat.sender, "srv");
            assert_eq!(chat.content, "done");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_motd_lines() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":srv 375 nova :- srv Message of the Day -").await;
    server.send(":srv 372 nova :- be nice").await;
    server.send(":srv 376 nova :End of /MOTD command.").await;

    let first = wait_for(&mut events, |e| matches!(e, Event::Motd { .. })).await;
    assert_eq!(
        first,
        Event::Motd {
            user: "nova".to_string(),
            content: "- srv Message of the Day -".to_string(),
        }
    );
    let second = wait_for(&mut events, |e| matches!(e, Event::Motd { .. })).await;
    assert_eq!(second.name(), "motd");
    assert!(matches!(second, Event::Motd { content, .. } if content == "- be nice"));
}

#[tokio::test(start_paused = true)]
async fn test_mode_direction_and_names() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":op!o@host MODE #rust +o bob").await;
    server.send(":op!o@host MODE #rust -b *!*@bad.host").await;
    server.send(":op!o@host MODE #rust b").await;

    let expected = [
        (ModeDirection::Add, "+mode", "+o", vec!["bob".to_string()]),
        (ModeDirection::Remove, "-mode", "-b", vec!["*!*@bad.host".to_string()]),
        (ModeDirection::Unsigned, "mode", "b", Vec::new()),
    ];
    for (want_direction, want_name, want_mode, want_affected) in expected {
        let event = wait_for(&mut events, |e| matches!(e, Event::Mode { .. })).await;
        assert_eq!(event.name(), want_name);
        match event {
            Event::Mode {
                direction,
                user,
                target,
                mode,
                affected,
                ..
            } => {
                assert_eq!(direction, want_direction);
                assert_eq!(user, "op");
                assert_eq!(target, "#rust");
                assert_eq!(mode, want_mode);
                assert_eq!(affected, want_affected);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_part_and_quit() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":bob!b@bob.host PART #rust :later").await;
    server.send(":eve!e@eve.host PART #rust").await;
    server.send(":bob!b@bob.host QUIT :Ping timeout").await;

    match wait_for(&mut events, |e| matches!(e, Event::Part { .. })).await {
        Event::Part {
            user,
            channel,
            reason,
            ..
        } => {
            assert_eq!(user, "bob");
            assert_eq!(channel, "#rust");
            assert_eq!(reason.as_deref(), Some("later"));
        }
        other => panic!("unexpected {:?}", other),
    }
    match wait_for(&mut events, |e| matches!(e, Event::Part { .. })).await {
        Event::Part { user, reason, .. } => {
            assert_eq!(user, "eve");
            assert_eq!(reason, None);
        }
        other => panic!("unexpected {:?}", other),
    }
    match wait_for(&mut events, |e| matches!(e, Event::Quit { .. })).await {
        Event::Quit {
            user, host, reason, ..
        } => {
            assert_eq!(user, "bob");
            assert_eq!(host.as_deref(), Some("bob.host"));
            assert_eq!(reason.as_deref(), Some("Ping timeout"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_banlist_entries() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":srv 367 nova #rust *!*@bad.host op!o@host 1700000000").await;
    server.send(":srv 367 nova #rust *!*@old.host").await;

    match wait_for(&mut events, |e| matches!(e, Event::Banlist { .. })).await {
        Event::Banlist {
            channel,
            mask,
            set_by,
            set_at,
        } => {
            assert_eq!(channel, "#rust");
            assert_eq!(mask, "*!*@bad.host");
            assert_eq!(set_by.as_deref(), Some("op!o@host"));
            assert_eq!(set_at.map(|t| t.timestamp()), Some(1_700_000_000));
        }
        other => panic!("unexpected {:?}", other),
    }
    match wait_for(&mut events, |e| matches!(e, Event::Banlist { .. })).await {
        Event::Banlist {
            mask,
            set_by,
            set_at,
            ..
        } => {
            assert_eq!(mask, "*!*@old.host");
            assert_eq!(set_by, None);
            assert_eq!(set_at, None);
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_names_and_protocol_error_events() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":srv 353 nova = #rust :@alice +bob nova").await;
    server.send(":srv 433 * nova :Nickname is already in use").await;

    let names = wait_for(&mut events, |e| matches!(e, Event::Names { .. })).await;
    assert_eq!(
        names,
        Event::Names {
            channel: "#rust".to_string(),
            names: vec!["@alice".into(), "+bob".into(), "nova".into()],
        }
    );

    match wait_for(&mut events, |e| matches!(e, Event::Error { .. })).await {
        Event::Error { kind, error, .. } => {
            assert_eq!(kind, ErrorKind::Protocol);
            assert_eq!(error, "Nickname is already in use");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_error_command_and_unknown() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":srv 998 nova :custom reply").await;
    server.send(":bob!b@host INVITE nova #secret").await;
    server.send("ERROR :Closing Link: too many connections").await;

    match wait_for(&mut events, |e| matches!(e, Event::Unknown { .. })).await {
        Event::Unknown { command, raw } => {
            assert_eq!(command, "998");
            assert_eq!(raw.params, vec!["nova", "custom reply"]);
        }
        other => panic!("unexpected {:?}", other),
    }
    match wait_for(&mut events, |e| matches!(e, Event::Unknown { .. })).await {
        Event::Unknown { command, .. } => assert_eq!(command, "INVITE"),
        other => panic!("unexpected {:?}", other),
    }
    match wait_for(&mut events, |e| matches!(e, Event::Error { .. })).await {
        Event::Error {
            kind,
            error,
            message,
        } => {
            assert_eq!(kind, ErrorKind::Protocol);
            assert_eq!(error, "Closing Link: too many connections");
            assert_eq!(message.map(|m| m.command), Some("ERROR".to_string()));
        }
        other => panic!("unexpected {:?}", other),
    }
}

// =============================================================================
// AUTO-REJOIN
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_rejoin_stops_at_limit() {
    let (client, mut events, mut server) = start(config().with_rejoin(3, 5_000), None);
    server.registered().await;

    let kicked_at = Instant::now();
    for _ in 0..5 {
        server.send(":op!o@host KICK #rust nova :out").await;
    }

    for _ in 0..3 {
        assert_eq!(server.recv().await, "JOIN #rust");
    }
    assert!(Instant::now() - kicked_at >= Duration::from_secs(5));
    assert!(server.stays_quiet(Duration::from_secs(60)).await);
    assert_eq!(
        client.rejoin_state("#RUST").expect("connected"),
        RejoinState::Exhausted
    );

    let mut kicks = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, Event::BotKicked { .. }) {
            kicks += 1;
        }
    }
    assert_eq!(kicks, 5);
}

#[tokio::test(start_paused = true)]
async fn test_confirmed_join_resets_rejoin_budget() {
    let (client, _events, mut server) = start(config().with_rejoin(1, 1_000), None);
    server.registered().await;

    for _ in 0..3 {
        server.send(":op!o@host KICK #rust nova :out").await;
        assert_eq!(server.recv().await, "JOIN #rust");
        server.send(":nova!n@host JOIN #rust").await;
    }

    server.send("PING :sync").await;
    assert_eq!(server.recv().await, "PONG sync");
    assert_eq!(
        client.rejoin_state("#rust").expect("connected"),
        RejoinState::Idle
    );
}

#[tokio::test(start_paused = true)]
async fn test_kick_of_someone_else_is_not_rejoined() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":op!o@host KICK #rust bob :bye").await;
    let kick = wait_for(&mut events, |e| matches!(e, Event::Kick { .. })).await;
    match kick {
        Event::Kick { kicked, reason, .. } => {
            assert_eq!(kicked, "bob");
            assert_eq!(reason, "bye");
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(server.stays_quiet(Duration::from_secs(30)).await);
}

// =============================================================================
// WHOIS
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_whois_aggregates_replies() {
    let (client, mut events, mut server) = start(config(), None);
    server.registered().await;

    let lookup = {
        let client = client.clone();
        tokio::spawn(async move { client.whois("alice").await })
    };
    assert_eq!(server.recv().await, "WHOIS alice");

    // A second lookup for the same nickname is refused while one is pending.
    assert!(matches!(
        client.whois("ALICE").await,
        Err(ClientError::Whois(WhoisError::AlreadyPending(_)))
    ));

    for line in [
        ":srv 311 nova alice ~al host.example * :Alice Liddell",
        ":srv 319 nova alice :@#rust #tea",
        ":srv 312 nova alice irc.test :Test server",
        ":srv 317 nova alice 42 1700000000 :seconds idle, signon time",
        ":srv 313 nova alice :is an IRC operator",
        ":srv 307 nova alice :has identified for this nick",
        ":srv 318 nova alice :End of /WHOIS list.",
    ] {
        server.send(line).await;
    }

    let record = lookup.await.expect("task completes").expect("lookup succeeds");
    assert_eq!(record.nick, "alice");
    assert_eq!(record.username.as_deref(), Some("~al"));
    assert_eq!(record.host.as_deref(), Some("host.example"));
    assert_eq!(record.realname.as_deref(), Some("Alice Liddell"));
    assert_eq!(record.server.as_deref(), Some("irc.test"));
    assert_eq!(record.channels, vec!["@#rust", "#tea"]);
    assert_eq!(record.idle_secs, Some(42));
    assert_eq!(record.signon.map(|t| t.timestamp()), Some(1_700_000_000));
    assert!(record.operator);
    assert!(record.registered);

    let event = wait_for(&mut events, |e| matches!(e, Event::Whois(_))).await;
    assert_eq!(event, Event::Whois(record));
}

#[tokio::test(start_paused = true)]
async fn test_whois_unknown_nick_fails() {
    let (client, mut events, mut server) = start(config(), None);
    server.registered().await;

    let lookup = {
        let client = client.clone();
        tokio::spawn(async move { client.whois("ghost").await })
    };
    assert_eq!(server.recv().await, "WHOIS ghost");
    server.send(":srv 401 nova ghost :No such nick/channel").await;

    let result = lookup.await.expect("task completes");
    assert!(matches!(
        result,
        Err(ClientError::Whois(WhoisError::NoSuchNick(ref nick))) if nick == "ghost"
    ));

    let event = wait_for(&mut events, |e| matches!(e, Event::Error { .. })).await;
    assert!(matches!(
        event,
        Event::Error {
            kind: ErrorKind::Protocol,
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_cleared_whois_fails_and_frees_nick() {
    let (client, _events, mut server) = start(config(), None);
    server.registered().await;

    // Queued behind the flood delay that follows USER.
    let lookup = client.whois("alice");
    tokio::pin!(lookup);
    assert!(futures_util::poll!(&mut lookup).is_pending());

    client.clear_queue().expect("connected");
    assert!(matches!(
        lookup.await,
        Err(ClientError::Whois(WhoisError::Cancelled(ref nick))) if nick == "alice"
    ));

    let again = {
        let client = client.clone();
        tokio::spawn(async move { client.whois("alice").await })
    };
    assert_eq!(server.recv().await, "WHOIS alice");
    server.send(":srv 318 nova alice :End of /WHOIS list.").await;
    let record = again.await.expect("task completes").expect("lookup succeeds");
    assert_eq!(record.nick, "alice");
}

#[tokio::test(start_paused = true)]
async fn test_join_of_other_user_triggers_whois() {
    let (_client, mut events, mut server) = start(config(), None);
    server.registered().await;

    server.send(":nova!n@host JOIN #rust").await;
    server.send(":bob!b@host JOIN #rust").await;

    assert_eq!(server.recv().await, "WHOIS bob");
    server.send(":srv 311 nova bob ~b host * :Bob").await;
    server.send(":srv 318 nova bob :End of /WHOIS list.").await;

    match wait_for(&mut events, |e| matches!(e, Event::Whois(_))).await {
        Event::Whois(record) => {
            assert_eq!(record.nick, "bob");
            assert_eq!(record.realname.as_deref(), Some("Bob"));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_pending_whois_fails_on_disconnect() {
    let (client, _events, mut server) = start(config(), None);
    server.registered().await;

    let lookup = {
        let client = client.clone();
        tokio::spawn(async move { client.whois("alice").await })
    };
    assert_eq!(server.recv().await, "WHOIS alice");
    drop(server);

    let result = lookup.await.expect("task completes");
    assert!(matches!(
        result,
        Err(ClientError::Whois(WhoisError::Disconnected(_)))
    ));
}

// =============================================================================
// LIFECYCLE
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_disconnect_sends_quit_and_closes() {
    let (client, mut events, mut server) = start(config(), None);
    server.registered().await;

    client.disconnect(Some("see you")).await.expect("connected");

    assert_eq!(server.recv().await, "QUIT :see you");
    assert!(server.lines.next().await.is_none());

    wait_for(&mut events, |e| *e == Event::Disconnected).await;
    assert!(!client.is_connected());
    assert!(matches!(
        client.send_raw("PING x"),
        Err(ClientError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_ends_session() {
    let (client, mut events) = client_for(None);
    client
        .connect_with_stream(config(), BrokenPipe)
        .expect("session starts");

    match wait_for(&mut events, |e| matches!(e, Event::Error { .. })).await {
        Event::Error { kind, message, .. } => {
            assert_eq!(kind, ErrorKind::Connection);
            assert!(message.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
    wait_for(&mut events, |e| *e == Event::Disconnected).await;

    assert!(!client.is_connected());
    assert!(matches!(
        client.send_raw("PRIVMSG #c :anyone?"),
        Err(ClientError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_server_hangup_ends_session() {
    let (client, mut events, server) = start(config(), None);
    drop(server);

    wait_for(&mut events, |e| *e == Event::Disconnected).await;
    assert!(!client.is_connected());

    // A new session may be started on the same client.
    let (local, _remote) = tokio::io::duplex(1024);
    client
        .connect_with_stream(config(), local)
        .expect("reconnect");
    assert!(client.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_second_connect_is_rejected() {
    let (client, _events, _server) = start(config(), None);
    let (local, _remote) = tokio::io::duplex(1024);
    assert!(matches!(
        client.connect_with_stream(config(), local),
        Err(ClientError::AlreadyConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_invalid_credentials_emit_error_event() {
    let client = Client::new();
    let mut events = client.subscribe();

    assert!(client.set_credentials("nova", "", None).is_err());
    match events.recv().await.expect("error event") {
        Event::Error { kind, message, .. } => {
            assert_eq!(kind, ErrorKind::Config);
            assert!(message.is_none());
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(client.nickname(), None);
}
