//! Persisted daemon state.
//!
//! The state file is the sole deduplication authority: a message id present
//! in `processed_message_ids` must never be re-enqueued or re-processed. The
//! file is written at the end of every cycle and at shutdown, so every
//! persisted snapshot is internally consistent.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DaemonState {
    /// Watermark: messages at or before this instant are assumed seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_processed_timestamp: Option<DateTime<Utc>>,

    /// Provider-qualified ids of messages already handled. Append-only
    /// during normal operation.
    pub processed_message_ids: HashSet<String>,

    pub total_emails_processed: u64,
    pub total_reminders_created: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error_message: Option<String>,
}

impl DaemonState {
    pub fn is_processed(&self, qualified_id: &str) -> bool {
        self.processed_message_ids.contains(qualified_id)
    }

    pub fn mark_processed(&mut self, qualified_id: String) {
        self.processed_message_ids.insert(qualified_id);
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.last_error_timestamp = Some(Utc::now());
        self.last_error_message = Some(message.into());
    }
}

/// Loads and saves [`DaemonState`] as a JSON file.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads persisted state. A missing or corrupt file degrades to the
    /// empty state rather than failing startup.
    pub async fn load(&self) -> DaemonState {
        let raw = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No state file at {}, starting fresh", self.path.display());
                return DaemonState::default();
            }
            Err(e) => {
                warn!(
                    "Failed to read state file {}: {}. Starting fresh.",
                    self.path.display(),
                    e
                );
                return DaemonState::default();
            }
        };

        match serde_json::from_str(&raw) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "State file {} is corrupt ({}). Starting fresh.",
                    self.path.display(),
                    e
                );
                DaemonState::default()
            }
        }
    }

    /// Writes the state file, creating parent directories as needed.
    pub async fn save(&self, state: &DaemonState) -> Result<(), StateError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StateError::WriteFile {
                    path: self.path.clone(),
                    source,
                })?;
        }

        let raw = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|source| StateError::WriteFile {
                path: self.path.clone(),
                source,
            })?;

        debug!(
            "Persisted state: {} processed ids, {} reminders created",
            state.processed_message_ids.len(),
            state.total_reminders_created
        );
        Ok(())
    }
}
