pub mod broadcast;
pub mod config;
pub mod daemon;
pub mod error;
pub mod extract;
pub mod logging;
pub mod mail;
pub mod reminder;
pub mod rules;

pub use broadcast::{DaemonEvent, DaemonEventBroadcaster};
pub use config::{load_config, DaemonConfig, ReminderDefaults};
pub use daemon::{DaemonState, DaemonStats, DaemonStatus, ReminderDaemon, StateStore};
pub use error::{
    ConfigError, DaemonError, MailError, MailminderError, ReminderError, Result, RuleError,
    StateError,
};
pub use extract::{ExtractionResult, FieldExtractor};
pub use mail::{EmailMessage, FetchOptions, MailSource};
pub use reminder::{CreatedReminder, ReminderSink};
pub use rules::{Rule, RuleMatcher, RuleStatus, RuleStore, YamlRuleStore};
