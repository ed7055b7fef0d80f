//! Builders for test rules, messages and configuration.

#![allow(dead_code)]

use std::path::Path;

use chrono::{DateTime, Utc};

use mailminder::config::DaemonConfig;
use mailminder::mail::EmailMessage;
use mailminder::rules::schema::{
    ExtractionSpec, FieldSpec, MatchCriteria, MatchScope, ReminderTemplate, Rule, RuleStatus,
    SimpleCriteria,
};

/// Config pointing its state file into a test directory.
pub fn test_config(state_dir: &Path) -> DaemonConfig {
    DaemonConfig {
        state_path: Some(state_dir.join("state.json")),
        ..DaemonConfig::default()
    }
}

pub fn message(provider: &str, id: &str, subject: &str, body: &str) -> EmailMessage {
    message_at(provider, id, subject, body, Utc::now())
}

pub fn message_at(
    provider: &str,
    id: &str,
    subject: &str,
    body: &str,
    timestamp: DateTime<Utc>,
) -> EmailMessage {
    EmailMessage {
        id: id.to_string(),
        sender: "billing@acme.example".to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        timestamp,
        source_provider: provider.to_string(),
        matched_rule_names: vec![],
    }
}

/// Rule matching any message whose subject contains `needle`, with no
/// extraction fields (extraction confidence is always 100).
pub fn rule_matching(name: &str, needle: &str) -> Rule {
    Rule {
        name: name.to_string(),
        status: RuleStatus::Active,
        providers: vec![],
        match_criteria: MatchCriteria::Simple(SimpleCriteria {
            scope: MatchScope::Subject,
            contains: Some(needle.to_string()),
            contains_any: None,
            contains_all: None,
            pattern: None,
            case_sensitive: true,
        }),
        extraction: ExtractionSpec::default(),
        reminder: ReminderTemplate {
            title: format!("Reminder from {}", name),
            notes: None,
            list: None,
            days_before_reminder: 1,
            time_of_day: None,
            due_date_field: None,
        },
    }
}

/// Rule with explicit extraction fields.
pub fn rule_with_fields(name: &str, needle: &str, fields: Vec<FieldSpec>) -> Rule {
    let mut rule = rule_matching(name, needle);
    rule.extraction = ExtractionSpec { fields };
    rule
}

pub fn field(name: &str, pattern: &str) -> FieldSpec {
    FieldSpec {
        name: name.to_string(),
        pattern: pattern.to_string(),
        transform: None,
        default: None,
        required: true,
    }
}
