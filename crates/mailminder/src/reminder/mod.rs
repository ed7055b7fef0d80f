//! Reminder sink contract and due-date computation.

pub mod due;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ReminderError;
use crate::rules::schema::ReminderTemplate;

pub use due::{compute_due_date, due_date_from_fields, parse_extracted_date, parse_time_of_day};

/// A reminder successfully created in the task-list application.
#[derive(Debug, Clone)]
pub struct CreatedReminder {
    pub reminder_id: String,
    pub due: Option<DateTime<Utc>>,
}

/// The task-list application the daemon writes reminders into.
///
/// Unlike mail sources the sink is mandatory: startup fails fast when
/// `test_access` reports failure, because every successful extraction must be
/// able to produce a reminder.
#[async_trait]
pub trait ReminderSink: Send + Sync {
    /// Cheap reachability/permission probe run once at daemon startup.
    async fn test_access(&self) -> Result<(), ReminderError>;

    /// Creates a reminder from extracted fields and a rule's template.
    ///
    /// `source_message_id` is the provider-qualified id of the originating
    /// email, recorded on the reminder for traceability.
    async fn create_reminder(
        &self,
        fields: &HashMap<String, String>,
        template: &ReminderTemplate,
        source_message_id: &str,
    ) -> Result<CreatedReminder, ReminderError>;
}
