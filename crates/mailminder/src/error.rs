use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailminderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Rule error: {0}")]
    Rule(#[from] RuleError),

    #[error("Mail source error: {0}")]
    Mail(#[from] MailError),

    #[error("Reminder sink error: {0}")]
    Reminder(#[from] ReminderError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("Daemon error: {0}")]
    Daemon(#[from] DaemonError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum RuleError {
    #[error("Failed to read rules document '{path}': {source}")]
    ReadDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write rules document '{path}': {source}")]
    WriteDocument {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse rules document: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Invalid rule '{name}': {reason}")]
    InvalidRule { name: String, reason: String },

    #[error("Duplicate rule name '{0}'")]
    DuplicateName(String),

    #[error("Unknown rule '{0}'")]
    UnknownRule(String),
}

/// Errors raised by mail source collaborators.
#[derive(Error, Debug)]
pub enum MailError {
    /// Connecting or authenticating against the provider failed.
    #[error("Failed to initialize mail source '{provider}': {reason}")]
    InitializationFailed { provider: String, reason: String },

    /// `get_emails` was called before the source became ready.
    #[error("Mail source '{0}' is not authenticated")]
    NotAuthenticated(String),

    /// A fetch against a ready source failed.
    #[error("Failed to fetch emails from '{provider}': {reason}")]
    FetchFailed { provider: String, reason: String },
}

/// Errors raised by the reminder sink collaborator.
#[derive(Error, Debug)]
pub enum ReminderError {
    #[error("Reminder sink access check failed: {0}")]
    AccessDenied(String),

    #[error("Failed to create reminder: {0}")]
    CreateFailed(String),

    #[error("Invalid time of day '{0}': expected HH:MM")]
    InvalidTimeOfDay(String),
}

#[derive(Error, Debug)]
pub enum StateError {
    #[error("Failed to read state file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write state file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DaemonError {
    /// `force_processing` requires a running daemon.
    #[error("Daemon is not running")]
    NotRunning,

    /// Every configured email client failed to initialize at startup.
    #[error("No email clients available: every configured mail source failed to initialize")]
    NoMailSourcesReady,

    /// The reminder sink rejected the startup access check.
    #[error("Reminder sink unavailable: {0}")]
    ReminderSinkUnavailable(String),

    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),
}

pub type Result<T> = std::result::Result<T, MailminderError>;
