//! The processing daemon: lifecycle, scheduling loop and introspection.
//!
//! The daemon owns the retry queue and the persisted state and coordinates
//! the rule store, mail sources and reminder sink through one processing
//! cycle at a time. Cycles never overlap: timer ticks skip when a cycle is
//! in flight, and `force_processing` waits its turn on the cycle guard.

pub mod cycle;
pub mod queue;
pub mod state;

pub use queue::{ProcessingQueue, QueueItem};
pub use state::{DaemonState, StateStore};

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broadcast::{DaemonEvent, DaemonEventBroadcaster};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};
use crate::mail::MailSource;
use crate::reminder::ReminderSink;
use crate::rules::RuleStore;

/// Lifecycle states of the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DaemonStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
}

impl DaemonStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => DaemonStatus::Starting,
            2 => DaemonStatus::Running,
            3 => DaemonStatus::Stopping,
            _ => DaemonStatus::Stopped,
        }
    }
}

/// Point-in-time snapshot of daemon health for operators.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonStats {
    pub status: DaemonStatus,
    pub queue_size: usize,
    pub ready_sources: Vec<String>,
    pub total_emails_processed: u64,
    pub total_reminders_created: u64,
    pub last_processed_timestamp: Option<DateTime<Utc>>,
    pub last_error_timestamp: Option<DateTime<Utc>>,
    pub last_error_message: Option<String>,
}

pub(crate) struct DaemonInner {
    pub(crate) config: DaemonConfig,
    pub(crate) rule_store: Arc<dyn RuleStore>,
    pub(crate) sources: Vec<Arc<dyn MailSource>>,
    pub(crate) sink: Arc<dyn ReminderSink>,
    pub(crate) state_store: StateStore,
    pub(crate) state: Mutex<DaemonState>,
    pub(crate) queue: Mutex<ProcessingQueue>,
    /// Serializes cycle entry. Timer ticks try-lock and skip; explicit
    /// triggers wait.
    pub(crate) cycle_guard: Mutex<()>,
    /// Providers that initialized successfully at the last start.
    pub(crate) ready: RwLock<Vec<String>>,
    status: AtomicU8,
    pub(crate) shutdown: AtomicBool,
    pub(crate) events: DaemonEventBroadcaster,
}

impl DaemonInner {
    pub(crate) fn status(&self) -> DaemonStatus {
        DaemonStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub(crate) fn set_status(&self, status: DaemonStatus) {
        self.status.store(status as u8, Ordering::Release);
    }
}

/// Long-running daemon turning rule-matched emails into task reminders.
///
/// Collaborators are injected at construction so multiple independent
/// instances can coexist (and be tested) in one process.
pub struct ReminderDaemon {
    inner: Arc<DaemonInner>,
    trigger: broadcast::Sender<()>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ReminderDaemon {
    pub fn new(
        config: DaemonConfig,
        rule_store: Arc<dyn RuleStore>,
        sources: Vec<Arc<dyn MailSource>>,
        sink: Arc<dyn ReminderSink>,
    ) -> Self {
        let state_store = StateStore::new(config.resolved_state_path());
        let (trigger, _) = broadcast::channel(16);

        Self {
            inner: Arc::new(DaemonInner {
                config,
                rule_store,
                sources,
                sink,
                state_store,
                state: Mutex::new(DaemonState::default()),
                queue: Mutex::new(ProcessingQueue::new()),
                cycle_guard: Mutex::new(()),
                ready: RwLock::new(Vec::new()),
                status: AtomicU8::new(DaemonStatus::Stopped as u8),
                shutdown: AtomicBool::new(false),
                events: DaemonEventBroadcaster::default(),
            }),
            trigger,
            task: Mutex::new(None),
        }
    }

    /// Subscribes to the daemon's observable events.
    pub fn subscribe(&self) -> broadcast::Receiver<DaemonEvent> {
        self.inner.events.subscribe()
    }

    pub fn status(&self) -> DaemonStatus {
        self.inner.status()
    }

    pub fn is_running(&self) -> bool {
        self.status() == DaemonStatus::Running
    }

    /// Starts the daemon: load state, initialize sources, verify the sink,
    /// run one cycle, then arm the repeating timer.
    ///
    /// Startup-fatal errors: zero mail sources ready, or the reminder sink
    /// failing its access check. Already running is a warned no-op.
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            warn!("start() called but daemon is already running");
            return Ok(());
        }
        self.inner.set_status(DaemonStatus::Starting);

        let loaded = self.inner.state_store.load().await;
        *self.inner.state.lock().await = loaded;

        // Initialize enabled sources in parallel, tolerating individual
        // failures. A source that fails here is excluded until the next
        // start.
        let enabled: Vec<Arc<dyn MailSource>> = self
            .inner
            .sources
            .iter()
            .filter(|s| self.inner.config.provider_enabled(s.provider_name()))
            .cloned()
            .collect();

        let inits = join_all(enabled.into_iter().map(|source| async move {
            let provider = source.provider_name().to_string();
            let result = source.initialize().await;
            (provider, source, result)
        }))
        .await;

        let mut ready = Vec::new();
        for (provider, source, result) in inits {
            match result {
                Ok(()) => {
                    if source.is_ready().await {
                        info!("Mail source '{}' ready", provider);
                        ready.push(provider);
                    } else {
                        warn!("Mail source '{}' initialized but is not ready", provider);
                    }
                }
                Err(e) => warn!("Mail source '{}' failed to initialize: {}", provider, e),
            }
        }

        if ready.is_empty() {
            self.inner.set_status(DaemonStatus::Stopped);
            return Err(DaemonError::NoMailSourcesReady.into());
        }
        *self.inner.ready.write().await = ready;

        // The sink is mandatory: every successful extraction must be able to
        // produce a reminder.
        if let Err(e) = self.inner.sink.test_access().await {
            self.inner.set_status(DaemonStatus::Stopped);
            return Err(DaemonError::ReminderSinkUnavailable(e.to_string()).into());
        }

        self.inner.shutdown.store(false, Ordering::Release);
        self.inner.set_status(DaemonStatus::Running);
        self.inner.events.send(DaemonEvent::Started);

        {
            let _guard = self.inner.cycle_guard.lock().await;
            self.inner.run_cycle().await;
        }

        let handle = self.spawn_scheduler();
        *self.task.lock().await = Some(handle);

        info!(
            "Daemon running, polling every {} minutes",
            self.inner.config.interval_minutes
        );
        Ok(())
    }

    fn spawn_scheduler(&self) -> JoinHandle<()> {
        let inner = Arc::clone(&self.inner);
        let mut trigger_rx = self.trigger.subscribe();
        let interval = self.inner.config.interval();

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);
            interval_timer.tick().await; // skip immediate first tick

            loop {
                if inner.shutdown.load(Ordering::Acquire) {
                    break;
                }

                tokio::select! {
                    _ = interval_timer.tick() => {},
                    Ok(()) = trigger_rx.recv() => {
                        debug!("Scheduler woken by trigger");
                    },
                }

                if inner.shutdown.load(Ordering::Acquire) {
                    break;
                }

                // At most one cycle executes at a time; a tick landing while
                // a cycle is in flight is skipped, not queued.
                match inner.cycle_guard.try_lock() {
                    Ok(_guard) => inner.run_cycle().await,
                    Err(_) => debug!("Cycle already in flight; skipping tick"),
                }
            }
        })
    }

    /// Stops the daemon: disarm the timer, wait for any in-flight cycle to
    /// finish naturally, persist state. Not running is a warned no-op.
    pub async fn stop(&self) {
        if self.status() != DaemonStatus::Running {
            warn!("stop() called but daemon is not running");
            return;
        }
        self.inner.set_status(DaemonStatus::Stopping);
        self.inner.shutdown.store(true, Ordering::Release);
        let _ = self.trigger.send(());

        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                error!("Scheduler task panicked: {:?}", e);
            }
        }

        // A force_processing cycle may still be in flight; wait for it.
        let _guard = self.inner.cycle_guard.lock().await;

        self.inner.persist_state().await;
        self.inner.set_status(DaemonStatus::Stopped);
        self.inner.events.send(DaemonEvent::Stopped);
        info!("Daemon stopped");
    }

    /// Runs one cycle immediately, independent of the timer. Waits for any
    /// in-flight cycle first; never runs concurrently with one.
    pub async fn force_processing(&self) -> Result<()> {
        if !self.is_running() {
            return Err(DaemonError::NotRunning.into());
        }
        let _guard = self.inner.cycle_guard.lock().await;
        self.inner.run_cycle().await;
        Ok(())
    }

    /// Snapshot of daemon health.
    pub async fn stats(&self) -> DaemonStats {
        let state = self.inner.state.lock().await.clone();
        let queue_size = self.inner.queue.lock().await.len();
        let ready_sources = self.inner.ready.read().await.clone();

        DaemonStats {
            status: self.status(),
            queue_size,
            ready_sources,
            total_emails_processed: state.total_emails_processed,
            total_reminders_created: state.total_reminders_created,
            last_processed_timestamp: state.last_processed_timestamp,
            last_error_timestamp: state.last_error_timestamp,
            last_error_message: state.last_error_message,
        }
    }

    /// Clone of the persisted state record.
    pub async fn state(&self) -> DaemonState {
        self.inner.state.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MailError, MailminderError, ReminderError};
    use crate::mail::{EmailMessage, FetchOptions};
    use crate::rules::schema::{Rule, RuleStatus};
    use crate::rules::store::RuleStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tempfile::TempDir;

    struct EmptyRuleStore;

    #[async_trait]
    impl RuleStore for EmptyRuleStore {
        async fn load_rules(&self) -> std::result::Result<Vec<Rule>, crate::error::RuleError> {
            Ok(vec![])
        }
        async fn get_active_rules(
            &self,
        ) -> std::result::Result<Vec<Rule>, crate::error::RuleError> {
            Ok(vec![])
        }
        async fn update_rule_status(
            &self,
            name: &str,
            _status: RuleStatus,
        ) -> std::result::Result<(), crate::error::RuleError> {
            Err(crate::error::RuleError::UnknownRule(name.to_string()))
        }
    }

    struct IdleSource;

    #[async_trait]
    impl MailSource for IdleSource {
        fn provider_name(&self) -> &str {
            "idle"
        }
        async fn initialize(&self) -> std::result::Result<(), MailError> {
            Ok(())
        }
        async fn is_ready(&self) -> bool {
            true
        }
        async fn get_emails(
            &self,
            _options: FetchOptions,
        ) -> std::result::Result<Vec<EmailMessage>, MailError> {
            Ok(vec![])
        }
    }

    struct OkSink;

    #[async_trait]
    impl ReminderSink for OkSink {
        async fn test_access(&self) -> std::result::Result<(), ReminderError> {
            Ok(())
        }
        async fn create_reminder(
            &self,
            _fields: &HashMap<String, String>,
            _template: &crate::rules::schema::ReminderTemplate,
            _source_message_id: &str,
        ) -> std::result::Result<crate::reminder::CreatedReminder, ReminderError> {
            Ok(crate::reminder::CreatedReminder {
                reminder_id: "R".to_string(),
                due: None,
            })
        }
    }

    fn daemon(dir: &TempDir) -> ReminderDaemon {
        let config = DaemonConfig {
            state_path: Some(dir.path().join("state.json")),
            ..DaemonConfig::default()
        };
        ReminderDaemon::new(
            config,
            Arc::new(EmptyRuleStore),
            vec![Arc::new(IdleSource) as Arc<dyn MailSource>],
            Arc::new(OkSink),
        )
    }

    #[tokio::test]
    async fn test_force_processing_requires_running() {
        let dir = TempDir::new().unwrap();
        let daemon = daemon(&dir);
        let result = daemon.force_processing().await;
        assert!(matches!(
            result,
            Err(MailminderError::Daemon(DaemonError::NotRunning))
        ));
    }

    #[tokio::test]
    async fn test_stop_when_not_running_is_noop() {
        let dir = TempDir::new().unwrap();
        let daemon = daemon(&dir);
        daemon.stop().await;
        assert_eq!(daemon.status(), DaemonStatus::Stopped);
    }

    #[tokio::test]
    async fn test_start_stop_lifecycle() {
        let dir = TempDir::new().unwrap();
        let daemon = daemon(&dir);

        daemon.start().await.unwrap();
        assert!(daemon.is_running());

        // Second start is a no-op.
        daemon.start().await.unwrap();
        assert!(daemon.is_running());

        daemon.stop().await;
        assert_eq!(daemon.status(), DaemonStatus::Stopped);

        // State file was persisted at shutdown.
        assert!(dir.path().join("state.json").exists());
    }
}
