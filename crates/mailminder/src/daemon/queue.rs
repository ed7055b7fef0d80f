//! In-memory retry queue of pending work items.

use chrono::{DateTime, Utc};

use crate::mail::EmailMessage;
use crate::rules::schema::Rule;

/// A matched message awaiting reminder creation.
///
/// Created when a message first matches a rule and is not in the dedup set.
/// Carries the rule snapshot it matched under; dropped on terminal success
/// or after the retry budget is exhausted.
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub message: EmailMessage,
    pub rules: Vec<Rule>,
    pub attempts: u32,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl QueueItem {
    pub fn new(message: EmailMessage, rules: Vec<Rule>) -> Self {
        Self {
            message,
            rules,
            attempts: 0,
            last_attempt_at: None,
            last_error: None,
        }
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.last_attempt_at = Some(Utc::now());
        self.last_error = Some(error.into());
    }
}

/// FIFO queue drained once per cycle.
#[derive(Debug, Default)]
pub struct ProcessingQueue {
    items: Vec<QueueItem>,
}

impl ProcessingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, qualified_id: &str) -> bool {
        self.items
            .iter()
            .any(|item| item.message.qualified_id() == qualified_id)
    }

    pub fn push(&mut self, item: QueueItem) {
        self.items.push(item);
    }

    /// Takes the full snapshot of pending items, clearing the live queue.
    /// Items re-appended during a drain wait for the next drain call.
    pub fn take_snapshot(&mut self) -> Vec<QueueItem> {
        std::mem::take(&mut self.items)
    }
}
