use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION};
use tracing::{debug, instrument, warn};

use crate::source::errors::SourceError;
use crate::source::types::{Envelope, SourceRecord};
use crate::source::{FetchRequest, RecordSource};
use crate::time::format_timestamp;

#[derive(Clone)]
pub struct RemoteClient {
    http: Client,
    url: String,
    token: String,
}

impl RemoteClient {
    pub fn new(url: String, token: String, timeout: Duration) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, url, token })
    }
}

#[async_trait]
impl RecordSource for RemoteClient {
    #[instrument(
        skip(self, request),
        fields(partition_key = %request.partition_key, window = %request.window),
        level = "debug"
    )]
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<SourceRecord>, SourceError> {
        let query = [
            ("limit", request.limit.to_string()),
            ("offset", request.offset.to_string()),
            ("portfolio", request.partition_key.clone()),
            ("start_date", format_timestamp(&request.window.start)),
            ("end_date", format_timestamp(&request.window.end)),
        ];

        let resp = self
            .http
            .get(&self.url)
            .header(AUTHORIZATION, format!("Token {}", self.token))
            .header(ACCEPT, "application/json")
            .query(&query)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "remote source rejected request");
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.bytes().await?;
        let records = parse_envelope(&body)?;

        debug!(records = records.len(), "remote page fetched");
        Ok(records)
    }
}

/// Extracts `results` from a response body.
///
/// A blank body, a `null` body, and a missing or `null` `results` field all
/// mean "no records". Anything that is not the envelope shape is an error.
pub fn parse_envelope(body: &[u8]) -> Result<Vec<SourceRecord>, SourceError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let envelope: Option<Envelope> = serde_json::from_slice(body)?;
    Ok(envelope.and_then(|e| e.results).unwrap_or_default())
}
