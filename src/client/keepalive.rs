//! Server liveness tracking.
//!
//! The server is expected to PING periodically. If it stays silent for a
//! whole keep-alive interval we send an unsolicited `PONG :KeepAlive` so
//! idle-timeout logic on the server side sees traffic from us.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::outbound::OutboundQueue;

pub(crate) const KEEPALIVE_COMMAND: &str = "PONG :KeepAlive";

pub(crate) struct KeepAlive {
    last_ping: Mutex<Instant>,
    interval: Duration,
}

impl KeepAlive {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            last_ping: Mutex::new(Instant::now()),
            interval,
        }
    }

    pub(crate) fn record_ping(&self) {
        *self.last_ping.lock() = Instant::now();
    }

    /// True once strictly more than one interval has passed since the last PING.
    pub(crate) fn is_stale(&self, now: Instant) -> bool {
        now.saturating_duration_since(*self.last_ping.lock()) > self.interval
    }

    /// Check every half interval until `token` is cancelled.
    pub(crate) async fn run(&self, queue: &OutboundQueue, token: CancellationToken) {
        let period = (self.interval / 2).max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = ticker.tick() => {}
            }
            if self.is_stale(Instant::now()) {
                warn!(
                    silent_for = ?self.interval,
                    "no PING from server, sending keep-alive"
                );
                queue.enqueue(KEEPALIVE_COMMAND);
            }
        }
    }
}
