pub mod observer;
pub mod webhook;

use async_trait::async_trait;
use tracing::info;

pub use observer::{SyncEvent, SyncObserver, TracingObserver};
pub use webhook::WebhookNotifier;

/// Operator-facing status channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Writes notifications to the log only.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(target: "notify", to, subject, body, "notification");
        Ok(())
    }
}
