//! StatusObserver port - ステータスメッセージの通知先
//!
//! Status trackers perform no I/O. Anything that wants to show progress (a
//! console, a UI, a log) implements this trait and gets pushed each message
//! right after it is recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// One message recorded for a named task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub task_name: String,
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Receives status events from trackers.
pub trait StatusObserver: Send + Sync {
    fn notify(&self, event: StatusEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StatusObserver for NoopObserver {
    fn notify(&self, _event: StatusEvent) {}
}

/// Forwards events to an unbounded channel.
///
/// Unbounded so a slow renderer never blocks the code doing the work; volume is
/// one event per recorded message.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    sender: mpsc::UnboundedSender<StatusEvent>,
}

impl ChannelObserver {
    pub fn new(sender: mpsc::UnboundedSender<StatusEvent>) -> Self {
        Self { sender }
    }

    /// Convenience: create the channel and return both ends.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<StatusEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl StatusObserver for ChannelObserver {
    fn notify(&self, event: StatusEvent) {
        // receiver may already be dropped
        let _ = self.sender.send(event);
    }
}
