//! Task status tracker: append-only, timestamped messages for one named,
//! long-running task.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::domain::TrackingError;
use crate::ports::{Clock, NoopObserver, StatusEvent, StatusObserver, SystemClock};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusMessage {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

/// Status log of a single task.
///
/// Every successful `record` is pushed to the configured [`StatusObserver`];
/// the tracker itself does no I/O.
pub struct TaskStatus {
    task_name: String,
    messages: Vec<StatusMessage>,
    clock: Arc<dyn Clock>,
    observer: Arc<dyn StatusObserver>,
}

impl TaskStatus {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            messages: Vec::new(),
            clock: Arc::new(SystemClock),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn StatusObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    /// Append a message stamped with the current time.
    ///
    /// Empty messages are rejected with `InvalidArgument` and not stored.
    pub fn record(&mut self, message: impl Into<String>) -> Result<(), TrackingError> {
        let message = message.into();
        if message.is_empty() {
            return Err(TrackingError::invalid_argument(format!(
                "status message for task {:?} must not be empty",
                self.task_name
            )));
        }

        let entry = StatusMessage {
            timestamp: self.clock.now(),
            message,
        };
        trace!(task = %self.task_name, message = %entry.message, "status recorded");
        self.observer.notify(StatusEvent {
            task_name: self.task_name.clone(),
            timestamp: entry.timestamp,
            message: entry.message.clone(),
        });
        self.messages.push(entry);
        Ok(())
    }

    /// Recorded messages, oldest first.
    pub fn messages(&self) -> &[StatusMessage] {
        &self.messages
    }

    pub fn latest(&self) -> Option<&StatusMessage> {
        self.messages.last()
    }
}

impl fmt::Debug for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskStatus")
            .field("task_name", &self.task_name)
            .field("messages", &self.messages)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{ChannelObserver, FixedClock};
    use chrono::{Duration, TimeZone};

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()))
    }

    #[test]
    fn record_appends_timestamped_messages_in_order() {
        let clock = clock();
        let mut status = TaskStatus::new("install").with_clock(clock.clone());

        status.record("resolving packages").unwrap();
        clock.advance(Duration::seconds(2));
        status.record("linking").unwrap();

        let messages = status.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].message, "resolving packages");
        assert_eq!(messages[1].message, "linking");
        assert_eq!(messages[1].timestamp - messages[0].timestamp, Duration::seconds(2));
        assert_eq!(status.latest().unwrap().message, "linking");
    }

    #[test]
    fn empty_message_is_rejected_and_not_stored() {
        let mut status = TaskStatus::new("install");
        status.record("started").unwrap();

        let err = status.record("").unwrap_err();
        assert!(matches!(err, TrackingError::InvalidArgument { .. }));
        assert_eq!(status.messages().len(), 1);
    }

    #[tokio::test]
    async fn observer_receives_each_recorded_message() {
        let (observer, mut rx) = ChannelObserver::channel();
        let mut status = TaskStatus::new("install").with_observer(Arc::new(observer));

        status.record("one").unwrap();
        let _ = status.record("");
        status.record("two").unwrap();
        drop(status);

        let mut seen = Vec::new();
        while let Some(event) = rx.recv().await {
            assert_eq!(event.task_name, "install");
            seen.push(event.message);
        }
        assert_eq!(seen, vec!["one", "two"]);
    }
}
