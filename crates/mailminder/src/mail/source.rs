//! Mail source trait implemented by provider adapters.

use async_trait::async_trait;

use crate::error::MailError;

use super::message::EmailMessage;

/// Options for a single fetch call.
#[derive(Debug, Clone, Copy)]
pub struct FetchOptions {
    /// Maximum number of messages to return.
    pub limit: usize,
}

/// A mail provider the daemon can pull messages from.
///
/// Implementations wrap one concrete provider (IMAP mailbox, REST API, test
/// double). The daemon initializes every enabled source at startup in
/// parallel and tolerates individual failures; a source that never becomes
/// ready is excluded until the next start.
#[async_trait]
pub trait MailSource: Send + Sync {
    /// Stable provider name, used for logging, config flags and id prefixes.
    fn provider_name(&self) -> &str;

    /// Connects and authenticates. Idempotent; returns an error on
    /// auth/network failure.
    async fn initialize(&self) -> Result<(), MailError>;

    /// Whether the source is ready to serve `get_emails`.
    async fn is_ready(&self) -> bool;

    /// Fetches up to `options.limit` unseen messages.
    ///
    /// Returns [`MailError::NotAuthenticated`] when called before the source
    /// is ready.
    async fn get_emails(&self, options: FetchOptions) -> Result<Vec<EmailMessage>, MailError>;
}
