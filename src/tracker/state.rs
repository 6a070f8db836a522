use std::collections::HashMap;

use anyhow::{bail, Result};
use serde::Serialize;

use crate::db::TrackedTab;
use crate::models::{SessionId, TabHandle, TabId};

/// `NoSession → Starting → Active → Closing → NoSession`.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "phase", content = "session_id", rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    NoSession,
    Starting,
    Active(SessionId),
    Closing(SessionId),
}

impl SessionPhase {
    pub fn active_session(&self) -> Option<SessionId> {
        match self {
            SessionPhase::Active(sid) => Some(*sid),
            _ => None,
        }
    }

    /// Session that still owns buffered events: active, or mid-close for
    /// the final flush.
    pub fn owning_session(&self) -> Option<SessionId> {
        match self {
            SessionPhase::Active(sid) | SessionPhase::Closing(sid) => Some(*sid),
            _ => None,
        }
    }

    pub fn begin_start(&mut self) -> Result<()> {
        if *self != SessionPhase::NoSession {
            bail!("cannot start a session while {self:?}");
        }
        *self = SessionPhase::Starting;
        Ok(())
    }

    /// `Starting → Active`, or a direct rejoin of a persisted session from
    /// `NoSession`.
    pub fn activate(&mut self, sid: SessionId) -> Result<()> {
        match self {
            SessionPhase::Starting | SessionPhase::NoSession => {
                *self = SessionPhase::Active(sid);
                Ok(())
            }
            other => bail!("cannot activate session {sid} while {other:?}"),
        }
    }

    pub fn begin_close(&mut self) -> Option<SessionId> {
        let sid = self.active_session()?;
        *self = SessionPhase::Closing(sid);
        Some(sid)
    }

    pub fn reset(&mut self) {
        *self = SessionPhase::NoSession;
    }
}

/// Browser tab handle → server tracking id, one id per live handle.
#[derive(Debug, Default)]
pub struct TabRegistry {
    tabs: HashMap<TabHandle, TabId>,
}

impl TabRegistry {
    pub fn get(&self, handle: TabHandle) -> Option<TabId> {
        self.tabs.get(&handle).copied()
    }

    pub fn contains(&self, handle: TabHandle) -> bool {
        self.tabs.contains_key(&handle)
    }

    pub fn insert(&mut self, handle: TabHandle, tid: TabId) -> Option<TabId> {
        self.tabs.insert(handle, tid)
    }

    pub fn remove(&mut self, handle: TabHandle) -> Option<TabId> {
        self.tabs.remove(&handle)
    }

    pub fn restore(&mut self, tabs: impl IntoIterator<Item = TrackedTab>) {
        self.tabs
            .extend(tabs.into_iter().map(|tab| (tab.tab_handle, tab.tid)));
    }

    pub fn clear(&mut self) {
        self.tabs.clear();
    }

    pub fn len(&self) -> usize {
        self.tabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tabs.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TrackerSnapshot {
    pub phase: SessionPhase,
    pub tracked_tabs: usize,
    pub pending_events: usize,
    pub idle_flush_armed: bool,
}
