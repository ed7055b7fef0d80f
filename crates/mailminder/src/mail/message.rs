//! Email message model shared by mail sources and the daemon.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An email fetched from a mail source.
///
/// `id` is unique within the provider's namespace only; the daemon keys its
/// dedup set by [`EmailMessage::qualified_id`] so ids from different
/// providers cannot collide. A message is never mutated after the matcher
/// fills in `matched_rule_names`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailMessage {
    /// Provider-scoped message id.
    pub id: String,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub timestamp: DateTime<Utc>,
    /// Name of the provider this message came from.
    pub source_provider: String,
    /// Names of rules that matched this message, filled in by the matcher.
    #[serde(default)]
    pub matched_rule_names: Vec<String>,
}

impl EmailMessage {
    /// Provider-qualified id used as the deduplication key.
    pub fn qualified_id(&self) -> String {
        make_id(&self.source_provider, &self.id)
    }
}

/// Builds a provider-qualified message id.
pub fn make_id(provider: &str, message_id: &str) -> String {
    format!("{}:{}", provider, message_id)
}
