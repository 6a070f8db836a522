//! Backend REST contract.
//!
//! The tracker talks to the backend only through [`TrackingApi`], so tests
//! can swap the HTTP client for an in-memory recorder.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{EventBatch, SessionId, SessionMetadata, TabId};

mod client;
mod dashboard;
#[cfg(test)]
pub(crate) mod fake;

pub use client::ApiClient;

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned HTTP {status}: {detail}")]
    Status {
        endpoint: String,
        status: u16,
        detail: String,
    },
    #[error("not authenticated; log in again")]
    Unauthorized,
    #[error("malformed response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized)
    }
}

#[async_trait]
pub trait TrackingApi: Send + Sync {
    async fn start_session(&self, metadata: &SessionMetadata) -> ApiResult<SessionId>;

    async fn close_session(&self, session_id: SessionId) -> ApiResult<()>;

    async fn open_tab(&self, session_id: SessionId, url: &str, title: &str) -> ApiResult<TabId>;

    async fn close_tab(&self, tab_id: TabId) -> ApiResult<()>;

    async fn send_batch(&self, batch: &EventBatch) -> ApiResult<()>;
}
