//! Daemon event broadcasting for operators and tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Observable daemon events.
///
/// Operators observe failures exclusively through these events and the
/// daemon's introspection methods; no exception escapes the lifecycle calls
/// except the documented startup-fatal and not-running cases.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DaemonEvent {
    Started,
    Stopped,
    #[serde(rename_all = "camelCase")]
    ProcessingComplete {
        cycle_id: String,
        emails_processed: usize,
        reminders_created: usize,
        #[serde(rename = "processingTime")]
        processing_time_ms: u64,
        queue_size: usize,
    },
    #[serde(rename_all = "camelCase")]
    ReminderCreated {
        email_id: String,
        reminder_id: String,
        rule_name: String,
        confidence: u8,
    },
    /// Terminal failure: an item exhausted its retry budget.
    #[serde(rename_all = "camelCase")]
    ProcessingFailed {
        email_id: String,
        error: String,
        attempts: u32,
    },
    /// Cycle-level failure; the daemon stays running and retries next tick.
    #[serde(rename_all = "camelCase")]
    ProcessingError {
        cycle_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Broadcasts daemon events to any number of subscribers.
#[derive(Clone)]
pub struct DaemonEventBroadcaster {
    sender: Arc<broadcast::Sender<DaemonEvent>>,
}

impl DaemonEventBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends an event to all subscribers.
    pub fn send(&self, event: DaemonEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for daemon events.
    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.sender.subscribe()
    }
}

impl Default for DaemonEventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}
