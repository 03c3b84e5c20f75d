pub mod client;
pub mod errors;
pub mod types;

use async_trait::async_trait;

use crate::batch::partition::Interval;

pub use client::RemoteClient;
pub use errors::SourceError;
pub use types::*;

/// Parameters for one page request against the remote source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub limit: u32,
    pub offset: u32,
    pub partition_key: String,
    pub window: Interval,
}

/// Anything that can return the records of one window.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<SourceRecord>, SourceError>;
}
