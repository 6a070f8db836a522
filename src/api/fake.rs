//! In-memory [`TrackingApi`] that records every call, for tracker tests.

use std::sync::{
    atomic::{AtomicBool, AtomicI64, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;

use super::{ApiError, ApiResult, TrackingApi};
use crate::models::{EventBatch, SessionId, SessionMetadata, TabId};

#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    StartSession(SessionMetadata),
    CloseSession(SessionId),
    OpenTab {
        session_id: SessionId,
        url: String,
        title: String,
    },
    CloseTab(TabId),
    SendBatch(EventBatch),
}

pub struct RecordingApi {
    calls: Mutex<Vec<ApiCall>>,
    next_sid: AtomicI64,
    next_tid: AtomicI64,
    fail_batches: AtomicBool,
    fail_sessions: AtomicBool,
}

impl RecordingApi {
    /// Sessions are numbered from 100, tabs from 1.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            next_sid: AtomicI64::new(100),
            next_tid: AtomicI64::new(1),
            fail_batches: AtomicBool::new(false),
            fail_sessions: AtomicBool::new(false),
        })
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn batches(&self) -> Vec<EventBatch> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ApiCall::SendBatch(batch) => Some(batch),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| matches(c)).count()
    }

    pub fn set_fail_batches(&self, fail: bool) {
        self.fail_batches.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_sessions(&self, fail: bool) {
        self.fail_sessions.store(fail, Ordering::SeqCst);
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn unavailable(endpoint: &str) -> ApiError {
        ApiError::Status {
            endpoint: endpoint.to_string(),
            status: 503,
            detail: "backend unavailable".into(),
        }
    }
}

#[async_trait]
impl TrackingApi for RecordingApi {
    async fn start_session(&self, metadata: &SessionMetadata) -> ApiResult<SessionId> {
        self.record(ApiCall::StartSession(metadata.clone()));
        if self.fail_sessions.load(Ordering::SeqCst) {
            return Err(Self::unavailable("/api/session/start"));
        }
        Ok(self.next_sid.fetch_add(1, Ordering::SeqCst))
    }

    async fn close_session(&self, session_id: SessionId) -> ApiResult<()> {
        self.record(ApiCall::CloseSession(session_id));
        Ok(())
    }

    async fn open_tab(&self, session_id: SessionId, url: &str, title: &str) -> ApiResult<TabId> {
        self.record(ApiCall::OpenTab {
            session_id,
            url: url.to_string(),
            title: title.to_string(),
        });
        Ok(self.next_tid.fetch_add(1, Ordering::SeqCst))
    }

    async fn close_tab(&self, tab_id: TabId) -> ApiResult<()> {
        self.record(ApiCall::CloseTab(tab_id));
        Ok(())
    }

    async fn send_batch(&self, batch: &EventBatch) -> ApiResult<()> {
        self.record(ApiCall::SendBatch(batch.clone()));
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(Self::unavailable("/api/events/batch"));
        }
        Ok(())
    }
}
