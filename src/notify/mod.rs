//! Run-report notification.
//!
//! One trait, one implementation: a LINE Messaging API push client. Send
//! failures are the notifier's own problem: the engine logs them and moves
//! on, it never retries and never fails a run over them.

pub mod line;

use anyhow::Result;
use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

/// Outbound text notification channel.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait NotifierPort: Send + Sync {
    /// Deliver one text message.
    async fn send(&self, text: &str) -> Result<()>;
}
