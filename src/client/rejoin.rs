//! Bounded automatic rejoin after being kicked.
//!
//! The controller only keeps the per-channel counters; the session decides
//! when to act on them and owns the delayed JOIN task.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::casemap::irc_to_lower;

/// Where a channel stands in the rejoin cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejoinState {
    /// Never kicked, or rejoined since.
    Idle,
    /// `n` rejoins scheduled since the last confirmed JOIN.
    Retrying(u32),
    /// The attempt limit is used up.
    Exhausted,
}

pub struct RejoinController {
    limit: u32,
    attempts: Mutex<HashMap<String, u32>>,
}

impl RejoinController {
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Record a kick from `channel`.
    ///
    /// Returns `true` if a rejoin should be scheduled, having counted it.
    pub fn on_kicked(&self, channel: &str) -> bool {
        let mut attempts = self.attempts.lock();
        let count = attempts.entry(irc_to_lower(channel)).or_insert(0);
        if *count >= self.limit {
            debug!(%channel, limit = self.limit, "rejoin attempts exhausted");
            return false;
        }
        *count += 1;
        debug!(%channel, attempt = *count, limit = self.limit, "scheduling rejoin");
        true
    }

    /// Our own JOIN to `channel` was confirmed by the server.
    pub fn on_joined(&self, channel: &str) {
        if self.attempts.lock().remove(&irc_to_lower(channel)).is_some() {
            debug!(%channel, "rejoin counter reset");
        }
    }

    pub fn state(&self, channel: &str) -> RejoinState {
        match self.attempts.lock().get(&irc_to_lower(channel)).copied() {
            None | Some(0) => RejoinState::Idle,
            Some(n) if n >= self.limit => RejoinState::Exhausted,
            Some(n) => RejoinState::Retrying(n),
        }
    }
}
