use std::sync::{Arc, Weak};

use anyhow::Result;
use serde::Serialize;
use tokio::{
    sync::Mutex,
    time::{self, Instant},
};

use crate::{
    api::TrackingApi,
    db::Database,
    models::{Activity, ActivityEvent, EventBatch, SessionId, SessionMetadata, TabHandle, TabId},
    settings::Settings,
    utils::clock::{Clock, SystemClock},
};

use super::{
    batcher::{EventBatcher, PushOutcome},
    is_trackable,
    state::{SessionPhase, TabRegistry, TrackerSnapshot},
    throttle::ActivityThrottle,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const DEFAULT_TAB_TITLE: &str = "New Tab";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Recovery {
    Rejoined { session_id: SessionId, tabs: usize },
    Started { session_id: SessionId },
    /// No persisted session and no credential.
    Inert,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityOutcome {
    Queued,
    Throttled,
    Untracked,
    NoSession,
}

struct Tracker {
    api: Arc<dyn TrackingApi>,
    db: Database,
    clock: Arc<dyn Clock>,
    settings: Settings,
    metadata: Option<SessionMetadata>,
    phase: SessionPhase,
    tabs: TabRegistry,
    batcher: EventBatcher,
    throttle: ActivityThrottle,
}

impl Tracker {
    fn metadata(&self) -> SessionMetadata {
        self.metadata.clone().unwrap_or_else(|| {
            SessionMetadata::detect(&self.settings.browser_name, &self.settings.browser_version)
        })
    }

    async fn start_session(
        &mut self,
        metadata: Option<SessionMetadata>,
    ) -> Result<Option<SessionId>> {
        if let Some(metadata) = metadata {
            self.metadata = Some(metadata);
        }

        if let Some(sid) = self.phase.active_session() {
            return Ok(Some(sid));
        }

        if self.db.auth_token().await?.is_none() {
            log_info!("No auth token, skipping session start");
            return Ok(None);
        }

        self.phase.begin_start()?;
        let metadata = self.metadata();

        match self.api.start_session(&metadata).await {
            Ok(sid) => {
                self.phase.activate(sid)?;
                if let Err(err) = self.db.set_session_id(sid).await {
                    log_warn!("Session {sid} will not survive a restart: {err:#}");
                }
                log_info!(
                    "Session started: {sid} ({} {} on {})",
                    metadata.browser_name,
                    metadata.browser_version,
                    metadata.platform
                );
                Ok(Some(sid))
            }
            Err(err) => {
                self.phase.reset();
                log_warn!("Failed to start session: {err}");
                Ok(None)
            }
        }
    }

    async fn close_session(&mut self) -> Result<bool> {
        let Some(sid) = self.phase.begin_close() else {
            return Ok(false);
        };

        let flushed = self.flush_pending("session close").await;

        if let Err(err) = self.api.close_session(sid).await {
            log_warn!("Failed to notify backend of session {sid} close: {err}");
        }

        self.tabs.clear();
        self.throttle.clear();
        self.phase.reset();

        let tabs_cleared = self.db.clear_tracked_tabs().await;
        let sid_cleared = self.db.clear_session_id().await;

        log_info!("Session closed: {sid} ({flushed} events in final batch)");
        tabs_cleared.and(sid_cleared)?;
        Ok(true)
    }

    /// Closes a session persisted by an earlier browser run along with its
    /// tab mappings. Returns the sid that was discarded.
    async fn discard_persisted_session(&mut self) -> Result<Option<SessionId>> {
        let Some(stale) = self.db.session_id().await? else {
            return Ok(None);
        };

        if let Err(err) = self.api.close_session(stale).await {
            log_warn!("Failed to close stale session {stale}: {err}");
        }
        self.db.clear_tracked_tabs().await?;
        self.db.clear_session_id().await?;
        log_info!("Discarded session {stale} from an earlier browser run");
        Ok(Some(stale))
    }

    async fn resolve_or_create_tab(
        &mut self,
        handle: TabHandle,
        url: &str,
        title: Option<&str>,
    ) -> Result<Option<TabId>> {
        if !is_trackable(url) {
            log_debug!("Not tracking tab {handle}: {url}");
            return Ok(None);
        }

        if let Some(tid) = self.tabs.get(handle) {
            return Ok(Some(tid));
        }

        let sid = match self.phase.active_session() {
            Some(sid) => sid,
            None => match self.start_session(None).await? {
                Some(sid) => sid,
                None => return Ok(None),
            },
        };

        let title = title
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(DEFAULT_TAB_TITLE);

        match self.api.open_tab(sid, url, title).await {
            Ok(tid) => {
                self.tabs.insert(handle, tid);
                self.db.upsert_tracked_tab(handle, tid, sid).await?;
                log_debug!("Tab {handle} tracked as {tid}");
                Ok(Some(tid))
            }
            Err(err) => {
                log_warn!("Failed to open tab {handle}: {err}");
                Ok(None)
            }
        }
    }

    async fn release_tab(&mut self, handle: TabHandle) -> Result<bool> {
        self.throttle.forget_tab(handle);

        let Some(tid) = self.tabs.remove(handle) else {
            return Ok(false);
        };

        if let Err(err) = self.api.close_tab(tid).await {
            log_warn!("Failed to close tab {tid}: {err}");
        }
        self.db.delete_tracked_tab(handle).await?;
        log_debug!("Tab {handle} released ({tid})");
        Ok(true)
    }

    /// Sends whatever is buffered as one batch. Failures are logged and the
    /// batch is dropped. Returns the number of events handed to the backend.
    async fn flush_pending(&mut self, reason: &str) -> usize {
        self.batcher.idle.cancel();

        let Some(events) = self.batcher.take() else {
            return 0;
        };
        let count = events.len();

        let Some(session_id) = self.phase.owning_session() else {
            log_warn!("Dropping {count} events with no session to own them");
            return 0;
        };

        let batch = EventBatch { session_id, events };
        match self.api.send_batch(&batch).await {
            Ok(()) => log_info!("Sent batch of {count} events ({reason})"),
            Err(err) => log_warn!("Dropped batch of {count} events ({reason}): {err}"),
        }
        count
    }
}

/// Owns the tracking session, the tab mappings and the pending batch.
///
/// Every operation holds the tracker lock for its whole duration, network
/// calls included. The lock is FIFO, so operations on one tab apply in the
/// order they were issued no matter how long the backend takes.
#[derive(Clone)]
pub struct TrackerController {
    inner: Arc<Mutex<Tracker>>,
}

impl TrackerController {
    pub fn new(api: Arc<dyn TrackingApi>, db: Database, settings: Settings) -> Self {
        Self::with_clock(api, db, settings, Arc::new(SystemClock))
    }

    pub fn with_clock(
        api: Arc<dyn TrackingApi>,
        db: Database,
        settings: Settings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tracker = Tracker {
            api,
            db,
            clock,
            batcher: EventBatcher::new(settings.batch_size),
            throttle: ActivityThrottle::new(settings.throttle_window()),
            settings,
            metadata: None,
            phase: SessionPhase::NoSession,
            tabs: TabRegistry::default(),
        };

        Self {
            inner: Arc::new(Mutex::new(tracker)),
        }
    }

    /// Rejoins a session persisted by a previous run of this process within
    /// the same browser run, or starts one if a credential is stored.
    pub async fn recover(&self, metadata: Option<SessionMetadata>) -> Result<Recovery> {
        let mut tracker = self.inner.lock().await;
        if let Some(metadata) = metadata {
            tracker.metadata = Some(metadata);
        }

        if let Some(session_id) = tracker.phase.active_session() {
            return Ok(Recovery::Rejoined {
                session_id,
                tabs: tracker.tabs.len(),
            });
        }

        if let Some(session_id) = tracker.db.session_id().await? {
            let tabs = tracker.db.tracked_tabs_for_session(session_id).await?;
            let count = tabs.len();
            tracker.phase.activate(session_id)?;
            tracker.tabs.restore(tabs);
            log_info!("Rejoined session {session_id} with {count} tracked tabs");
            return Ok(Recovery::Rejoined {
                session_id,
                tabs: count,
            });
        }

        Ok(match tracker.start_session(None).await? {
            Some(session_id) => Recovery::Started { session_id },
            None => Recovery::Inert,
        })
    }

    /// The browser itself launched. Tab handles from any earlier browser run
    /// are meaningless now, so a leftover session is closed, in memory or
    /// persisted, and a fresh one is started.
    pub async fn begin_browser_run(&self, metadata: Option<SessionMetadata>) -> Result<Recovery> {
        let mut tracker = self.inner.lock().await;
        if let Some(metadata) = metadata {
            tracker.metadata = Some(metadata);
        }

        if !tracker.close_session().await? {
            tracker.discard_persisted_session().await?;
        }

        Ok(match tracker.start_session(None).await? {
            Some(session_id) => Recovery::Started { session_id },
            None => Recovery::Inert,
        })
    }

    /// Starts a session unless one is active. `None` means tracking stays
    /// inert: no credential, or the backend refused.
    pub async fn start_session(
        &self,
        metadata: Option<SessionMetadata>,
    ) -> Result<Option<SessionId>> {
        self.inner.lock().await.start_session(metadata).await
    }

    /// Final flush, backend notification, then all session and tab state is
    /// cleared. Returns whether a session was open.
    pub async fn close_session(&self) -> Result<bool> {
        self.inner.lock().await.close_session().await
    }

    pub async fn resolve_or_create_tab(
        &self,
        handle: TabHandle,
        url: &str,
        title: Option<&str>,
    ) -> Result<Option<TabId>> {
        self.inner
            .lock()
            .await
            .resolve_or_create_tab(handle, url, title)
            .await
    }

    pub async fn release_tab(&self, handle: TabHandle) -> Result<bool> {
        self.inner.lock().await.release_tab(handle).await
    }

    /// A navigation on `handle`. While loading, an untracked tab gets a
    /// tracking id; tracked tabs record the URL change, or stop being
    /// tracked when they leave the web.
    pub async fn tab_updated(
        &self,
        handle: TabHandle,
        url: Option<&str>,
        title: Option<&str>,
        loading: bool,
    ) -> Result<()> {
        let Some(url) = url else {
            return Ok(());
        };

        let mut tracker = self.inner.lock().await;
        if loading && !tracker.tabs.contains(handle) {
            tracker.resolve_or_create_tab(handle, url, title).await?;
        }

        let Some(tid) = tracker.tabs.get(handle) else {
            return Ok(());
        };

        if is_trackable(url) {
            let activity = Activity::UrlChange {
                url: url.to_string(),
            };
            self.enqueue_locked(&mut tracker, tid, activity).await;
        } else {
            tracker.release_tab(handle).await?;
        }
        Ok(())
    }

    pub async fn focus_tab(&self, handle: TabHandle) -> bool {
        let mut tracker = self.inner.lock().await;
        match tracker.tabs.get(handle) {
            Some(tid) => self.enqueue_locked(&mut tracker, tid, Activity::TabFocus).await,
            None => false,
        }
    }

    /// In-page activity reported for a browser tab.
    pub async fn record_activity(&self, handle: TabHandle, activity: Activity) -> ActivityOutcome {
        let mut tracker = self.inner.lock().await;

        let Some(tid) = tracker.tabs.get(handle) else {
            return ActivityOutcome::Untracked;
        };
        if tracker.phase.active_session().is_none() {
            return ActivityOutcome::NoSession;
        }
        if !tracker.throttle.admit(handle, activity.kind(), Instant::now()) {
            return ActivityOutcome::Throttled;
        }

        self.enqueue_locked(&mut tracker, tid, activity).await;
        ActivityOutcome::Queued
    }

    /// Stamps and buffers an event for `tab_id`. Dropped (returns `false`)
    /// when no session is active.
    pub async fn enqueue(&self, tab_id: TabId, activity: Activity) -> bool {
        let mut tracker = self.inner.lock().await;
        self.enqueue_locked(&mut tracker, tab_id, activity).await
    }

    pub async fn flush(&self) -> usize {
        self.inner.lock().await.flush_pending("requested").await
    }

    /// Flushes and disarms the idle timer, leaving the session persisted for
    /// the next run to rejoin.
    pub async fn shutdown(&self) -> usize {
        self.inner.lock().await.flush_pending("shutdown").await
    }

    pub async fn snapshot(&self) -> TrackerSnapshot {
        let tracker = self.inner.lock().await;
        TrackerSnapshot {
            phase: tracker.phase,
            tracked_tabs: tracker.tabs.len(),
            pending_events: tracker.batcher.len(),
            idle_flush_armed: tracker.batcher.idle.is_armed(),
        }
    }

    async fn enqueue_locked(&self, tracker: &mut Tracker, tab_id: TabId, activity: Activity) -> bool {
        if tracker.phase.active_session().is_none() {
            log_debug!(
                "No session, dropping {} for tab {tab_id}",
                activity.kind().as_str()
            );
            return false;
        }

        let event = ActivityEvent::new(tab_id, activity, tracker.clock.now());
        match tracker.batcher.push(event) {
            PushOutcome::FlushNow => {
                tracker.flush_pending("batch full").await;
            }
            PushOutcome::ArmIdle => self.arm_idle_flush(tracker),
        }
        true
    }

    fn arm_idle_flush(&self, tracker: &mut Tracker) {
        let delay = tracker.settings.idle_flush();
        let inner: Weak<Mutex<Tracker>> = Arc::downgrade(&self.inner);

        tracker.batcher.idle.arm(move |generation| {
            tokio::spawn(async move {
                time::sleep(delay).await;

                let Some(inner) = inner.upgrade() else {
                    return;
                };
                let mut tracker = inner.lock().await;
                if tracker.batcher.idle.fire(generation) {
                    tracker.flush_pending("idle").await;
                }
            })
        });
    }
}
