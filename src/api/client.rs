use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;

use super::{ApiError, ApiResult, TrackingApi};
use crate::db::Database;
use crate::models::{
    session::{SessionStarted, TabOpened},
    EventBatch, SessionId, SessionMetadata, TabId,
};

/// Whether a request carries the stored bearer token. Only login and
/// signup go out without one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Auth {
    Bearer,
    Anonymous,
}

/// HTTP client for the backend. The bearer token is read from local state
/// on every request, so a login from another process takes effect without
/// a restart.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    db: Database,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration, db: Database) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            db,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(super) fn db(&self) -> &Database {
        &self.db
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, endpoint))
            .header(header::ACCEPT, "application/json")
    }

    async fn authorize(&self, request: RequestBuilder, auth: Auth) -> ApiResult<RequestBuilder> {
        if auth == Auth::Anonymous {
            return Ok(request);
        }
        Ok(match self.db.auth_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn dispatch(
        &self,
        endpoint: &str,
        request: RequestBuilder,
        auth: Auth,
    ) -> ApiResult<Response> {
        let request = self.authorize(request, auth).await?;
        let response = request.send().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;

        let status = response.status();
        debug!("{endpoint} -> {status}");

        if status == StatusCode::UNAUTHORIZED && auth == Auth::Bearer {
            // A rejected token is dead.
            if let Err(err) = self.db.clear_auth_token().await {
                warn!("Failed to clear rejected auth token: {err:#}");
            }
            return Err(ApiError::Unauthorized);
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        Ok(response)
    }

    pub(super) async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
        auth: Auth,
    ) -> ApiResult<T> {
        let response = self.dispatch(endpoint, request, auth).await?;
        let bytes = response.bytes().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode {
            endpoint: endpoint.to_string(),
            message: err.to_string(),
        })
    }

    /// Like [`call`](Self::call) for endpoints whose body is ignored.
    pub(super) async fn call_unit(
        &self,
        endpoint: &str,
        request: RequestBuilder,
        auth: Auth,
    ) -> ApiResult<()> {
        self.dispatch(endpoint, request, auth).await.map(|_| ())
    }

    pub(super) async fn post<B, T>(&self, endpoint: &str, body: &B, auth: Auth) -> ApiResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.request(Method::POST, endpoint).json(body);
        self.call(endpoint, request, auth).await
    }

    pub(super) async fn post_unit<B>(&self, endpoint: &str, body: &B) -> ApiResult<()>
    where
        B: Serialize + ?Sized,
    {
        let request = self.request(Method::POST, endpoint).json(body);
        self.call_unit(endpoint, request, Auth::Bearer).await
    }

    pub(super) async fn get<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let request = self.request(Method::GET, endpoint).query(query);
        self.call(endpoint, request, Auth::Bearer).await
    }

    pub(super) async fn delete(&self, endpoint: &str, query: &[(&str, String)]) -> ApiResult<()> {
        let request = self.request(Method::DELETE, endpoint).query(query);
        self.call_unit(endpoint, request, Auth::Bearer).await
    }
}

#[async_trait]
impl TrackingApi for ApiClient {
    async fn start_session(&self, metadata: &SessionMetadata) -> ApiResult<SessionId> {
        let started: SessionStarted = self
            .post("/api/session/start", metadata, Auth::Bearer)
            .await?;
        Ok(started.sid)
    }

    async fn close_session(&self, session_id: SessionId) -> ApiResult<()> {
        self.post_unit("/api/session/close", &json!({ "sid": session_id }))
            .await
    }

    async fn open_tab(&self, session_id: SessionId, url: &str, title: &str) -> ApiResult<TabId> {
        let body = json!({
            "session_id": session_id,
            "url": url,
            "title": title,
        });
        let opened: TabOpened = self.post("/api/tab/open", &body, Auth::Bearer).await?;
        Ok(opened.tid)
    }

    async fn close_tab(&self, tab_id: TabId) -> ApiResult<()> {
        self.post_unit("/api/tab/close", &json!({ "tid": tab_id }))
            .await
    }

    async fn send_batch(&self, batch: &EventBatch) -> ApiResult<()> {
        self.post_unit("/api/events/batch", batch).await
    }
}

/// FastAPI puts the message under `detail`; fall back to the raw body.
fn error_detail(body: &str) -> String {
    let detail = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail") {
            Some(serde_json::Value::String(text)) => Some(text.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        });

    let text = detail.unwrap_or_else(|| body.trim().to_string());
    if text.chars().count() > 200 {
        let truncated: String = text.chars().take(200).collect();
        format!("{truncated}...")
    } else {
        text
    }
}
