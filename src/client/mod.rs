//! The connection engine.
//!
//! [`Client`] is the public handle. Each successful connect creates a
//! `Session` that owns the outbound queue, the keep-alive monitor, the
//! rejoin controller and the WHOIS coordinator, plus a cancellation token
//! shared by every task spawned for that connection:
//!
//! - the reader task decodes frames and dispatches them strictly in order;
//! - the writer task is the only owner of the transport sink;
//! - the queue drain and keep-alive tasks run on their own timers;
//! - join and rejoin delays are short-lived tasks that die with the token.

mod dispatch;
mod keepalive;
mod outbound;
mod rejoin;
mod whois;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::colors::Color;
use crate::config::{ConnectionConfig, Credentials};
use crate::error::{ClientError, Result, WhoisError};
use crate::event::{ErrorKind, Event, EventBus, EventHandler};
use crate::line::LineCodec;
use crate::transport;
use crate::util::split_message;

use self::keepalive::KeepAlive;
use self::outbound::{OutboundQueue, Outgoing};
pub use self::rejoin::{RejoinController, RejoinState};
pub use self::whois::{WhoisCoordinator, WhoisRecord, WhoisResult, WhoisTicket};

/// Quit message used when `disconnect` is given none.
pub const DEFAULT_QUIT_MESSAGE: &str = "Goodbye!";

/// Default capacity of the broadcast event channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Upper bound on each wait in [`Client::disconnect`].
const DISCONNECT_GRACE: Duration = Duration::from_secs(5);

type LineSink<S> = SplitSink<Framed<S, LineCodec>, String>;
type LineStream<S> = SplitStream<Framed<S, LineCodec>>;

/// Handle to an IRC connection. Cheap to clone.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    events: Arc<EventBus>,
    credentials: RwLock<Option<Credentials>>,
    session: Mutex<Option<Arc<Session>>>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Client whose broadcast channel buffers `capacity` events per subscriber.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                events: Arc::new(EventBus::new(capacity)),
                credentials: RwLock::new(None),
                session: Mutex::new(None),
            }),
        }
    }

    /// Receive every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.inner.events.subscribe()
    }

    /// Attach a synchronous observer, called before broadcast subscribers.
    pub fn register_handler(&self, handler: Arc<dyn EventHandler>) {
        self.inner.events.register(handler);
    }

    /// Set the identity used at registration.
    ///
    /// An empty nickname or username emits an [`Event::Error`] and leaves the
    /// previous credentials untouched.
    pub fn set_credentials(
        &self,
        nickname: &str,
        username: &str,
        password: Option<&str>,
    ) -> Result<()> {
        match Credentials::new(nickname, username, password.map(str::to_string)) {
            Ok(credentials) => {
                self.set_identity(credentials);
                Ok(())
            }
            Err(e) => {
                self.inner.events.emit(Event::Error {
                    kind: ErrorKind::Config,
                    error: e.to_string(),
                    message: None,
                });
                Err(e.into())
            }
        }
    }

    /// Set already-validated credentials, e.g. with a custom realname.
    pub fn set_identity(&self, credentials: Credentials) {
        *self.inner.credentials.write() = Some(credentials);
    }

    /// Current nickname: the session's if connected, else the configured one.
    pub fn nickname(&self) -> Option<String> {
        match self.session() {
            Ok(session) => Some(session.nickname()),
            Err(_) => self
                .inner
                .credentials
                .read()
                .as_ref()
                .map(|c| c.nickname.clone()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session().is_ok()
    }

    /// Open the configured transport and register.
    pub async fn connect(&self, config: ConnectionConfig) -> Result<()> {
        config.validate()?;
        self.credentials()?;
        self.ensure_idle()?;

        let stream = match transport::connect(&config).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(host = %config.host, port = config.port, error = %e, "connect failed");
                self.inner.events.emit(Event::Error {
                    kind: ErrorKind::Connection,
                    error: e.to_string(),
                    message: None,
                });
                return Err(e);
            }
        };
        self.connect_with_stream(config, stream)
    }

    /// Run a session over an already-open stream.
    pub fn connect_with_stream<S>(&self, config: ConnectionConfig, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        config.validate()?;
        let credentials = self.credentials()?;

        let (sink, stream) = Framed::new(stream, LineCodec::new()).split();
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let session = {
            let mut slot = self.inner.session.lock();
            if slot.as_ref().is_some_and(|s| s.is_open()) {
                return Err(ClientError::AlreadyConnected);
            }
            let session = Arc::new(Session::new(
                config,
                &credentials,
                self.inner.events.clone(),
                writer_tx,
            ));
            *slot = Some(session.clone());
            session
        };

        let writer = tokio::spawn(run_writer(session.clone(), sink, writer_rx));
        *session.writer_task.lock() = Some(writer);

        let drain = session.clone();
        tokio::spawn(async move {
            drain
                .queue
                .run(drain.config.flood_delay(), drain.token.clone())
                .await
        });

        let monitor = session.clone();
        tokio::spawn(async move {
            monitor
                .keepalive
                .run(&monitor.queue, monitor.token.clone())
                .await
        });

        info!(nick = %credentials.nickname, "session started");
        session.events.emit(Event::Connected);
        session.register(&credentials);

        tokio::spawn(run_reader(session, stream));
        Ok(())
    }

    /// Join `channel` after the configured settle delay.
    pub fn join_channel(&self, channel: &str, key: Option<&str>) -> Result<()> {
        let session = self.session()?;
        let command = match key.filter(|k| !k.is_empty()) {
            Some(key) => format!("JOIN {} {}", channel, key),
            None => format!("JOIN {}", channel),
        };
        session.schedule(session.config.join_delay(), command);
        Ok(())
    }

    pub fn part(&self, channel: &str, reason: Option<&str>) -> Result<()> {
        self.send_raw(&with_reason(format!("PART {}", channel), reason))
    }

    /// Request the member list of `channel`.
    pub fn names(&self, channel: &str) -> Result<()> {
        self.send_raw(&format!("NAMES {}", channel))
    }

    pub fn kick(&self, channel: &str, user: &str, reason: Option<&str>) -> Result<()> {
        self.send_raw(&with_reason(format!("KICK {} {}", channel, user), reason))
    }

    /// Add `mask` to the ban list of `channel`.
    pub fn ban(&self, channel: &str, mask: &str) -> Result<()> {
        self.send_raw(&format!("MODE {} +b {}", channel, mask))
    }

    /// Request the ban list of `channel`.
    pub fn banlist(&self, channel: &str) -> Result<()> {
        self.send_raw(&format!("MODE {} +b", channel))
    }

    /// Send `text` to `target`, split at word boundaries to fit the line
    /// budget. A connection-wide color takes precedence over `color`.
    pub fn send_message(&self, target: &str, text: &str, color: Option<Color>) -> Result<()> {
        let session = self.session()?;
        let color = session.config.message_color.or(color);
        for line in format_message(text, color, session.config.max_line_length) {
            session
                .queue
                .enqueue(format!("PRIVMSG {} :{}", target, line));
        }
        Ok(())
    }

    /// Queue a raw protocol line.
    pub fn send_raw(&self, line: &str) -> Result<()> {
        self.session()?.queue.enqueue(line);
        Ok(())
    }

    /// Auto-rejoin progress for `channel` in the current session.
    pub fn rejoin_state(&self, channel: &str) -> Result<RejoinState> {
        Ok(self.session()?.rejoin.state(channel))
    }

    /// Drop every queued command that has not been written yet.
    ///
    /// WHOIS lookups whose command is dropped fail with
    /// [`WhoisError::Cancelled`].
    pub fn clear_queue(&self) -> Result<()> {
        self.session()?.clear_queue();
        Ok(())
    }

    /// Look up `nick`, resolving once the server ends the WHOIS reply.
    ///
    /// Only one lookup per nickname may be in flight; a second call for the
    /// same nickname fails with [`WhoisError::AlreadyPending`].
    pub async fn whois(&self, nick: &str) -> Result<WhoisRecord> {
        let session = self.session()?;
        let ticket = session.begin_whois(nick)?;
        drop(session);

        let result = ticket
            .receiver
            .await
            .unwrap_or_else(|_| Err(WhoisError::Disconnected(nick.to_string())));
        Ok(result?)
    }

    /// Send `QUIT`, let the queue drain, then close the connection.
    pub async fn disconnect(&self, reason: Option<&str>) -> Result<()> {
        let session = self.session()?;
        session.queue.enqueue(format!(
            "QUIT :{}",
            reason.unwrap_or(DEFAULT_QUIT_MESSAGE)
        ));

        if tokio::time::timeout(DISCONNECT_GRACE, session.queue.wait_idle())
            .await
            .is_err()
        {
            warn!(
                pending = session.queue.len(),
                "outbound queue not drained before disconnect"
            );
        }
        session.queue.close_writer();

        let writer = session.writer_task.lock().take();
        if let Some(writer) = writer {
            if tokio::time::timeout(DISCONNECT_GRACE, writer).await.is_err() {
                warn!("writer did not finish before disconnect");
            }
        }

        session.close();
        Ok(())
    }

    fn session(&self) -> Result<Arc<Session>> {
        self.inner
            .session
            .lock()
            .clone()
            .filter(|s| s.is_open())
            .ok_or(ClientError::NotConnected)
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.session() {
            Ok(_) => Err(ClientError::AlreadyConnected),
            Err(_) => Ok(()),
        }
    }

    fn credentials(&self) -> Result<Credentials> {
        self.inner
            .credentials
            .read()
            .clone()
            .ok_or_else(|| crate::error::ConfigError::MissingCredentials.into())
    }
}

fn with_reason(command: String, reason: Option<&str>) -> String {
    match reason.filter(|r| !r.is_empty()) {
        Some(reason) => format!("{} :{}", command, reason),
        None => command,
    }
}

/// Split `text` into PRIVMSG bodies of at most `max_len` bytes each,
/// color codes included.
pub(crate) fn format_message(text: &str, color: Option<Color>, max_len: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }
    let budget = max_len.saturating_sub(color.map_or(0, Color::overhead)).max(1);
    split_message(text, budget)
        .filter(|part| !part.trim().is_empty())
        .map(|part| match color {
            Some(color) => color.wrap(part),
            None => part.to_string(),
        })
        .collect()
}

/// State for one live connection.
pub(crate) struct Session {
    config: ConnectionConfig,
    nickname: RwLock<String>,
    events: Arc<EventBus>,
    queue: OutboundQueue,
    keepalive: KeepAlive,
    rejoin: RejoinController,
    whois: WhoisCoordinator,
    token: CancellationToken,
    closed: AtomicBool,
    writer_task: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    fn new(
        config: ConnectionConfig,
        credentials: &Credentials,
        events: Arc<EventBus>,
        writer: mpsc::UnboundedSender<Outgoing>,
    ) -> Self {
        Self {
            keepalive: KeepAlive::new(config.keepalive_interval()),
            rejoin: RejoinController::new(config.rejoin_attempts),
            nickname: RwLock::new(credentials.nickname.clone()),
            queue: OutboundQueue::new(writer),
            whois: WhoisCoordinator::new(),
            token: CancellationToken::new(),
            closed: AtomicBool::new(false),
            writer_task: Mutex::new(None),
            config,
            events,
        }
    }

    fn is_open(&self) -> bool {
        !self.closed.load(Ordering::Acquire)
    }

    fn nickname(&self) -> String {
        self.nickname.read().clone()
    }

    fn register(&self, credentials: &Credentials) {
        self.queue.enqueue(format!("NICK {}", credentials.nickname));
        self.queue.enqueue(format!(
            "USER {} 0 * :{}",
            credentials.username, credentials.realname
        ));
        if let Some(password) = &credentials.password {
            self.queue
                .enqueue(format!("PRIVMSG NickServ :IDENTIFY {}", password));
        }
    }

    /// Queue `command` after `delay`, unless the session ends first.
    fn schedule(self: &Arc<Self>, delay: Duration, command: String) {
        let session = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = session.token.cancelled() => {
                    debug!(%command, "delayed command cancelled");
                }
                _ = tokio::time::sleep(delay) => session.queue.enqueue(command),
            }
        });
    }

    fn begin_whois(&self, nick: &str) -> std::result::Result<WhoisTicket, WhoisError> {
        let ticket = self.whois.begin(nick)?;
        self.queue.enqueue(format!("WHOIS {}", nick));
        Ok(ticket)
    }

    fn clear_queue(&self) {
        for command in self.queue.clear() {
            if let Some(nick) = command.strip_prefix("WHOIS ") {
                self.whois.cancel(nick);
            }
        }
    }

    /// End the session once: stop every task, drop unsent commands, fail
    /// pending lookups and emit [`Event::Disconnected`].
    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.token.cancel();
        self.queue.clear();
        if !self.whois.is_empty() {
            debug!(pending = self.whois.len(), "failing outstanding whois lookups");
        }
        self.whois.fail_all();
        info!("session closed");
        self.events.emit(Event::Disconnected);
    }
}

async fn run_reader<S>(session: Arc<Session>, mut stream: LineStream<S>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            _ = session.token.cancelled() => break,
            next = stream.next() => next,
        };
        match next {
            Some(Ok(line)) => session.handle_line(line),
            Some(Err(e)) => {
                warn!(error = %e, "read failed");
                session.events.emit(Event::Error {
                    kind: ErrorKind::Connection,
                    error: e.to_string(),
                    message: None,
                });
                break;
            }
            None => {
                info!("server closed the connection");
                break;
            }
        }
    }
    session.close();
}

async fn run_writer<S>(
    session: Arc<Session>,
    mut sink: LineSink<S>,
    mut rx: mpsc::UnboundedReceiver<Outgoing>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    loop {
        let next = tokio::select! {
            biased;
            next = rx.recv() => next,
            _ = session.token.cancelled() => None,
        };
        let (line, written) = match next {
            Some(Outgoing::Line(line)) => (line, None),
            Some(Outgoing::Paced { line, written }) => (line, Some(written)),
            Some(Outgoing::Close) | None => break,
        };

        if line.starts_with("PRIVMSG NickServ :IDENTIFY") {
            debug!(">> PRIVMSG NickServ :IDENTIFY ********");
        } else {
            debug!(">> {}", line);
        }
        // `send` flushes, so the line has left our buffers once it returns.
        if let Err(e) = sink.send(line).await {
            warn!(error = %e, "write failed");
            session.events.emit(Event::Error {
                kind: ErrorKind::Connection,
                error: e.to_string(),
                message: None,
            });
            session.close();
            break;
        }
        if let Some(written) = written {
            let _ = written.send(());
        }
    }
    if let Err(e) = sink.close().await {
        debug!(error = %e, "error closing transport");
    }
}
