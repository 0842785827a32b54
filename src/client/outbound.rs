//! Flood-controlled outbound queue.
//!
//! Commands are appended to a FIFO and released to the writer task one at a
//! time. The next command is released only after the writer has flushed the
//! previous one and the flood delay has elapsed since, so a stalled socket
//! cannot bunch queued lines together.
//! [`OutboundQueue::send_immediate`] skips the queue for replies that must
//! not wait (PONG).

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Instruction for the writer task.
#[derive(Debug)]
pub(crate) enum Outgoing {
    /// Write now, nobody waits for it.
    Line(String),
    /// Write, then fire `written` once the line is flushed.
    Paced {
        line: String,
        written: oneshot::Sender<()>,
    },
    /// Flush and shut down the write half.
    Close,
}

pub(crate) struct OutboundQueue {
    pending: Mutex<VecDeque<String>>,
    wake: Notify,
    depth: watch::Sender<usize>,
    writer: mpsc::UnboundedSender<Outgoing>,
}

impl OutboundQueue {
    pub(crate) fn new(writer: mpsc::UnboundedSender<Outgoing>) -> Self {
        let (depth, _) = watch::channel(0);
        Self {
            pending: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
            depth,
            writer,
        }
    }

    /// Append a command; it is written once everything ahead of it has gone out.
    pub(crate) fn enqueue(&self, command: impl Into<String>) {
        let command = command.into();
        trace!(%command, "queued");
        let depth = {
            let mut pending = self.pending.lock();
            pending.push_back(command);
            pending.len()
        };
        self.depth.send_replace(depth);
        self.wake.notify_one();
    }

    /// Write a command now, ahead of anything queued.
    pub(crate) fn send_immediate(&self, command: impl Into<String>) {
        self.forward(Outgoing::Line(command.into()));
    }

    /// Drop every command that has not been written yet and return them.
    pub(crate) fn clear(&self) -> Vec<String> {
        let dropped: Vec<String> = self.pending.lock().drain(..).collect();
        if !dropped.is_empty() {
            debug!(dropped = dropped.len(), "outbound queue cleared");
        }
        self.depth.send_replace(0);
        dropped
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Resolves once the queue is empty.
    pub(crate) async fn wait_idle(&self) {
        let mut depth = self.depth.subscribe();
        loop {
            if *depth.borrow_and_update() == 0 {
                return;
            }
            if depth.changed().await.is_err() {
                return;
            }
        }
    }

    pub(crate) fn close_writer(&self) {
        let _ = self.writer.send(Outgoing::Close);
    }

    fn forward(&self, outgoing: Outgoing) {
        if self.writer.send(outgoing).is_err() {
            debug!("transport closed, dropping outbound command");
        }
    }

    /// Drain loop; runs until `token` is cancelled.
    pub(crate) async fn run(&self, flood_delay: Duration, token: CancellationToken) {
        loop {
            let next = self.pending.lock().pop_front();
            match next {
                Some(line) => {
                    let (written, flushed) = oneshot::channel();
                    self.forward(Outgoing::Paced { line, written });
                    self.depth.send_replace(self.len());
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return,
                        _ = async {
                            // Err means the writer is gone; pace anyway.
                            let _ = flushed.await;
                            tokio::time::sleep(flood_delay).await;
                        } => {}
                    }
                }
                None => {
                    tokio::select! {
                        biased;
                        _ = token.cancelled() => return,
                        _ = self.wake.notified() => {}
                    }
                }
            }
        }
    }
}
