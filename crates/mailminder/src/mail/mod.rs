//! Mail source contract and message model.

pub mod message;
pub mod source;

pub use message::EmailMessage;
pub use source::{FetchOptions, MailSource};
