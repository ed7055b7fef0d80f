//! One processing cycle: fetch, match, enqueue, drain, persist.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, error, info, warn};

use crate::broadcast::DaemonEvent;
use crate::error::MailminderError;
use crate::extract::FieldExtractor;
use crate::mail::{EmailMessage, FetchOptions, MailSource};
use crate::rules::RuleMatcher;

use super::queue::QueueItem;
use super::DaemonInner;

#[derive(Debug, Default)]
struct CycleOutcome {
    enqueued: usize,
    emails_processed: usize,
    reminders_created: usize,
    queue_size: usize,
}

#[derive(Debug, Default)]
struct DrainOutcome {
    emails_processed: usize,
    reminders_created: usize,
}

enum ItemResult {
    /// At least one reminder was created and nothing failed.
    Completed { reminders_created: usize },
    /// Every extraction fell below the confidence gate; a successful,
    /// low-value outcome dropped without retry.
    Skipped,
    Failed { error: String },
}

impl DaemonInner {
    /// Runs one processing cycle. The caller must hold the cycle guard.
    ///
    /// Never returns an error: cycle-level failures are recorded into the
    /// persisted state and surfaced as a `processingError` event, and the
    /// daemon keeps running.
    pub(crate) async fn run_cycle(&self) {
        let cycle_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let started = std::time::Instant::now();
        info!("Starting processing cycle {}", cycle_id);

        match self.cycle_inner().await {
            Ok(outcome) => {
                self.persist_state().await;
                info!(
                    "Cycle {} complete: {} enqueued, {} processed, {} reminders, queue {}",
                    cycle_id,
                    outcome.enqueued,
                    outcome.emails_processed,
                    outcome.reminders_created,
                    outcome.queue_size
                );
                self.events.send(DaemonEvent::ProcessingComplete {
                    cycle_id,
                    emails_processed: outcome.emails_processed,
                    reminders_created: outcome.reminders_created,
                    processing_time_ms: started.elapsed().as_millis() as u64,
                    queue_size: outcome.queue_size,
                });
            }
            Err(e) => {
                error!("Processing cycle {} failed: {}", cycle_id, e);
                {
                    let mut state = self.state.lock().await;
                    state.record_error(e.to_string());
                }
                self.persist_state().await;
                self.events.send(DaemonEvent::ProcessingError {
                    cycle_id,
                    error: e.to_string(),
                    timestamp: Utc::now(),
                });
            }
        }
    }

    async fn cycle_inner(&self) -> Result<CycleOutcome, MailminderError> {
        // One consistent rule snapshot per cycle; rules may change between
        // cycles but never within one.
        let rules = self.rule_store.get_active_rules().await?;
        let matcher = RuleMatcher::new(rules.clone());

        let messages = self.fetch_new_messages().await;
        let fetched = messages.len();

        // Dedup set and watermark filter. Messages dated at or before the
        // watermark are assumed seen; clock-skewed stragglers are permanently
        // skipped.
        let survivors: Vec<EmailMessage> = {
            let state = self.state.lock().await;
            let watermark = state.last_processed_timestamp;
            messages
                .into_iter()
                .filter(|m| !state.is_processed(&m.qualified_id()))
                .filter(|m| watermark.map_or(true, |w| m.timestamp > w))
                .collect()
        };

        let mut enqueued = 0usize;
        {
            let state = self.state.lock().await;
            let mut queue = self.queue.lock().await;
            for mut message in survivors {
                let matched = matcher.matched_rule_names(&message);
                if matched.is_empty() {
                    continue;
                }
                let qualified = message.qualified_id();
                // Defensive re-check before enqueue.
                if state.is_processed(&qualified) || queue.contains(&qualified) {
                    continue;
                }
                message.matched_rule_names = matched.clone();
                let item_rules = rules
                    .iter()
                    .filter(|r| matched.contains(&r.name))
                    .cloned()
                    .collect();
                queue.push(QueueItem::new(message, item_rules));
                enqueued += 1;
            }
        }
        debug!("Fetched {} messages, enqueued {}", fetched, enqueued);

        let drain = self.drain_queue().await;
        let queue_size = self.queue.lock().await.len();

        {
            let mut state = self.state.lock().await;
            state.last_processed_timestamp = Some(Utc::now());
        }

        Ok(CycleOutcome {
            enqueued,
            emails_processed: drain.emails_processed,
            reminders_created: drain.reminders_created,
            queue_size,
        })
    }

    /// Fetches from every ready source concurrently, all-settled: one
    /// source's failure never blocks or fails the others.
    async fn fetch_new_messages(&self) -> Vec<EmailMessage> {
        let ready_names = self.ready.read().await.clone();
        let mut ready_sources: Vec<Arc<dyn MailSource>> = Vec::new();
        for source in &self.sources {
            if !ready_names.iter().any(|n| n == source.provider_name()) {
                continue;
            }
            if source.is_ready().await {
                ready_sources.push(Arc::clone(source));
            }
        }

        if ready_sources.is_empty() {
            warn!("No mail sources ready this cycle");
            return Vec::new();
        }

        // Floor division: slightly under-fetch rather than exceed the
        // configured ceiling.
        let per_source = self.config.max_emails_per_scan / ready_sources.len();

        let fetches = join_all(ready_sources.into_iter().map(|source| async move {
            let provider = source.provider_name().to_string();
            let result = source.get_emails(FetchOptions { limit: per_source }).await;
            (provider, result)
        }))
        .await;

        let mut messages = Vec::new();
        for (provider, result) in fetches {
            match result {
                Ok(batch) => {
                    debug!("Fetched {} messages from '{}'", batch.len(), provider);
                    messages.extend(batch);
                }
                Err(e) => error!("Fetch from '{}' failed: {}", provider, e),
            }
        }
        messages
    }

    /// Drains the current queue snapshot once. Failed items go back on the
    /// live queue for the next drain; exhausted items are dropped and
    /// surfaced as `processingFailed`.
    async fn drain_queue(&self) -> DrainOutcome {
        let snapshot = self.queue.lock().await.take_snapshot();
        if snapshot.is_empty() {
            return DrainOutcome::default();
        }
        debug!("Draining {} queued items", snapshot.len());

        let mut outcome = DrainOutcome::default();
        for mut item in snapshot {
            let qualified = item.message.qualified_id();
            match self.process_item(&item).await {
                ItemResult::Completed { reminders_created } => {
                    let mut state = self.state.lock().await;
                    state.mark_processed(qualified);
                    state.total_emails_processed += 1;
                    outcome.emails_processed += 1;
                    outcome.reminders_created += reminders_created;
                }
                ItemResult::Skipped => {
                    debug!("All extractions for '{}' below confidence gate", qualified);
                }
                ItemResult::Failed { error } => {
                    item.record_failure(error);
                    if item.attempts < self.config.retry_attempts {
                        debug!(
                            "Re-queueing '{}' after failure (attempt {}/{})",
                            qualified, item.attempts, self.config.retry_attempts
                        );
                        self.queue.lock().await.push(item);
                    } else {
                        // Terminal. The id stays out of the dedup set so a
                        // rule change or manual re-trigger can reprocess it;
                        // automatic retries stop here.
                        let error = item.last_error.clone().unwrap_or_default();
                        warn!(
                            "Dropping '{}' after {} failed attempts: {}",
                            qualified, item.attempts, error
                        );
                        self.events.send(DaemonEvent::ProcessingFailed {
                            email_id: qualified,
                            error,
                            attempts: item.attempts,
                        });
                    }
                }
            }
        }
        outcome
    }

    /// Extracts and creates reminders for one queue item across all of its
    /// matched rules.
    async fn process_item(&self, item: &QueueItem) -> ItemResult {
        let qualified = item.message.qualified_id();
        let mut created = 0usize;

        for rule in &item.rules {
            let extractor = FieldExtractor::new(&rule.extraction);
            let extraction = extractor.extract(&item.message);

            if extraction.confidence < self.config.min_confidence {
                debug!(
                    "Extraction for '{}' under rule '{}' scored {}, skipping reminder",
                    qualified, rule.name, extraction.confidence
                );
                continue;
            }

            match self
                .sink
                .create_reminder(&extraction.fields, &rule.reminder, &qualified)
                .await
            {
                Ok(reminder) => {
                    info!(
                        "Created reminder {} for '{}' (rule '{}')",
                        reminder.reminder_id, qualified, rule.name
                    );
                    self.events.send(DaemonEvent::ReminderCreated {
                        email_id: qualified.clone(),
                        reminder_id: reminder.reminder_id,
                        rule_name: rule.name.clone(),
                        confidence: extraction.confidence,
                    });
                    {
                        let mut state = self.state.lock().await;
                        state.total_reminders_created += 1;
                    }
                    created += 1;
                }
                Err(e) => {
                    return ItemResult::Failed {
                        error: e.to_string(),
                    };
                }
            }
        }

        if created > 0 {
            ItemResult::Completed {
                reminders_created: created,
            }
        } else {
            ItemResult::Skipped
        }
    }

    /// Best-effort state persistence; write failures are logged, not fatal.
    pub(crate) async fn persist_state(&self) {
        let snapshot = self.state.lock().await.clone();
        if let Err(e) = self.state_store.save(&snapshot).await {
            error!("Failed to persist state: {}", e);
        }
    }
}
