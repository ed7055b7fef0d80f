//! Mock collaborators for daemon integration tests.

#![allow(dead_code)]

pub mod builders;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use mailminder::error::{MailError, ReminderError, RuleError};
use mailminder::mail::{EmailMessage, FetchOptions, MailSource};
use mailminder::reminder::{CreatedReminder, ReminderSink};
use mailminder::rules::schema::{ReminderTemplate, Rule, RuleStatus};
use mailminder::rules::RuleStore;

/// Rule store serving a fixed rule set from memory.
pub struct StaticRuleStore {
    rules: Mutex<Vec<Rule>>,
    pub load_calls: AtomicUsize,
}

impl StaticRuleStore {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self {
            rules: Mutex::new(rules),
            load_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RuleStore for StaticRuleStore {
    async fn load_rules(&self) -> Result<Vec<Rule>, RuleError> {
        self.load_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rules.lock().unwrap().clone())
    }

    async fn get_active_rules(&self) -> Result<Vec<Rule>, RuleError> {
        let rules = self.load_rules().await?;
        Ok(rules
            .into_iter()
            .filter(|r| r.status == RuleStatus::Active)
            .collect())
    }

    async fn update_rule_status(&self, name: &str, status: RuleStatus) -> Result<(), RuleError> {
        let mut rules = self.rules.lock().unwrap();
        let rule = rules
            .iter_mut()
            .find(|r| r.name == name)
            .ok_or_else(|| RuleError::UnknownRule(name.to_string()))?;
        rule.status = status;
        Ok(())
    }
}

/// Mail source returning scripted batches of messages.
///
/// Each fetch pops the next batch; once batches run out the sticky batch
/// (if any) is returned forever, which simulates a provider re-serving
/// already-seen messages.
pub struct ScriptedSource {
    provider: String,
    fail_init: bool,
    ready: AtomicBool,
    batches: Mutex<VecDeque<Vec<EmailMessage>>>,
    sticky: Mutex<Option<Vec<EmailMessage>>>,
    pub fetch_calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            fail_init: false,
            ready: AtomicBool::new(false),
            batches: Mutex::new(VecDeque::new()),
            sticky: Mutex::new(None),
            fetch_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_init(provider: &str) -> Self {
        Self {
            fail_init: true,
            ..Self::new(provider)
        }
    }

    /// Queues a batch returned by exactly one fetch.
    pub fn with_batch(self, batch: Vec<EmailMessage>) -> Self {
        self.batches.lock().unwrap().push_back(batch);
        self
    }

    /// Sets the batch returned by every fetch after queued batches run out.
    pub fn with_sticky(self, batch: Vec<EmailMessage>) -> Self {
        *self.sticky.lock().unwrap() = Some(batch);
        self
    }
}

#[async_trait]
impl MailSource for ScriptedSource {
    fn provider_name(&self) -> &str {
        &self.provider
    }

    async fn initialize(&self) -> Result<(), MailError> {
        if self.fail_init {
            return Err(MailError::InitializationFailed {
                provider: self.provider.clone(),
                reason: "scripted auth failure".to_string(),
            });
        }
        self.ready.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    async fn get_emails(&self, _options: FetchOptions) -> Result<Vec<EmailMessage>, MailError> {
        if !self.ready.load(Ordering::SeqCst) {
            return Err(MailError::NotAuthenticated(self.provider.clone()));
        }
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(batch) = self.batches.lock().unwrap().pop_front() {
            return Ok(batch);
        }
        Ok(self.sticky.lock().unwrap().clone().unwrap_or_default())
    }
}

/// One recorded `create_reminder` call.
#[derive(Debug, Clone)]
pub struct SinkCall {
    pub fields: HashMap<String, String>,
    pub template_title: String,
    pub source_message_id: String,
}

/// Scripted outcome for a sink call.
pub enum SinkOutcome {
    Ok(&'static str),
    Fail(&'static str),
}

/// Reminder sink recording calls and following a script of outcomes.
///
/// When the script runs out, calls succeed with generated ids unless the
/// sink was built with `always_failing`.
pub struct RecordingSink {
    deny_access: bool,
    always_fail: bool,
    delay: Option<Duration>,
    script: Mutex<VecDeque<SinkOutcome>>,
    pub calls: Mutex<Vec<SinkCall>>,
    concurrent: AtomicUsize,
    pub max_concurrent: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            deny_access: false,
            always_fail: false,
            delay: None,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            concurrent: AtomicUsize::new(0),
            max_concurrent: AtomicUsize::new(0),
        }
    }

    pub fn denying_access() -> Self {
        Self {
            deny_access: true,
            ..Self::new()
        }
    }

    pub fn always_failing() -> Self {
        Self {
            always_fail: true,
            ..Self::new()
        }
    }

    pub fn with_script(self, outcomes: Vec<SinkOutcome>) -> Self {
        *self.script.lock().unwrap() = outcomes.into();
        self
    }

    /// Adds a per-call delay so tests can provoke would-be overlap.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ReminderSink for RecordingSink {
    async fn test_access(&self) -> Result<(), ReminderError> {
        if self.deny_access {
            return Err(ReminderError::AccessDenied(
                "scripted access denial".to_string(),
            ));
        }
        Ok(())
    }

    async fn create_reminder(
        &self,
        fields: &HashMap<String, String>,
        template: &ReminderTemplate,
        source_message_id: &str,
    ) -> Result<CreatedReminder, ReminderError> {
        let entered = self.concurrent.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent.fetch_max(entered, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().unwrap().push(SinkCall {
            fields: fields.clone(),
            template_title: template.title.clone(),
            source_message_id: source_message_id.to_string(),
        });

        let outcome = self.script.lock().unwrap().pop_front();
        self.concurrent.fetch_sub(1, Ordering::SeqCst);

        match outcome {
            Some(SinkOutcome::Ok(id)) => Ok(CreatedReminder {
                reminder_id: id.to_string(),
                due: None,
            }),
            Some(SinkOutcome::Fail(reason)) => {
                Err(ReminderError::CreateFailed(reason.to_string()))
            }
            None if self.always_fail => {
                Err(ReminderError::CreateFailed("scripted outage".to_string()))
            }
            None => Ok(CreatedReminder {
                reminder_id: format!("R{}", self.call_count()),
                due: None,
            }),
        }
    }
}
