use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, instrument};

use crate::notify::Notifier;

#[derive(Debug, Serialize)]
struct Payload<'a> {
    to: &'a str,
    subject: &'a str,
    body: &'a str,
}

/// Posts each notification as `{to, subject, body}` JSON.
#[derive(Clone)]
pub struct WebhookNotifier {
    http: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build webhook http client")?;
        Ok(Self { http, url })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    #[instrument(skip(self, body), target = "notify", level = "debug")]
    async fn notify(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        self.http
            .post(&self.url)
            .json(&Payload { to, subject, body })
            .send()
            .await
            .context("webhook request failed")?
            .error_for_status()
            .context("webhook rejected notification")?;

        debug!("notification delivered");
        Ok(())
    }
}
