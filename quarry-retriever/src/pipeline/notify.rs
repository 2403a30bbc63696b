//! Operator notification channel.
//!
//! Hard failures surface to operators through a fire-and-forget
//! [`Notifier`]: a subject and a body, no delivery guarantee. Implementations
//! must swallow their own delivery failures (logging them) — a broken mail
//! relay must never fail a processing job.

use async_trait::async_trait;
use tracing::warn;

/// Fire-and-forget message channel to administrators.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send a message. Never returns an error: delivery failures are the
    /// implementation's problem to log.
    async fn notify(&self, subject: &str, body: &str);
}

/// Notifier that writes messages to the log instead of delivering them.
///
/// The default wiring for deployments without a mail channel configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        warn!(subject, "operator notification:\n{body}");
    }
}
