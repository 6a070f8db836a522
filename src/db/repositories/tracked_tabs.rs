use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::params;

use crate::db::Database;
use crate::models::{SessionId, TabHandle, TabId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackedTab {
    pub tab_handle: TabHandle,
    pub tid: TabId,
}

impl Database {
    pub async fn upsert_tracked_tab(
        &self,
        tab_handle: TabHandle,
        tid: TabId,
        session_id: SessionId,
    ) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO tracked_tabs (tab_handle, tid, session_id, opened_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(tab_handle) DO UPDATE SET
                     tid = excluded.tid,
                     session_id = excluded.session_id,
                     opened_at = excluded.opened_at",
                params![tab_handle, tid, session_id, Utc::now().to_rfc3339()],
            )
            .with_context(|| format!("failed to record tracked tab {tab_handle}"))?;
            Ok(())
        })
        .await
    }

    pub async fn delete_tracked_tab(&self, tab_handle: TabHandle) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "DELETE FROM tracked_tabs WHERE tab_handle = ?1",
                params![tab_handle],
            )
            .with_context(|| format!("failed to delete tracked tab {tab_handle}"))?;
            Ok(())
        })
        .await
    }

    pub async fn tracked_tabs_for_session(&self, session_id: SessionId) -> Result<Vec<TrackedTab>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT tab_handle, tid FROM tracked_tabs
                 WHERE session_id = ?1
                 ORDER BY tab_handle",
            )?;

            let rows = stmt
                .query_map(params![session_id], |row| {
                    Ok(TrackedTab {
                        tab_handle: row.get(0)?,
                        tid: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()
                .context("failed to load tracked tabs")?;

            Ok(rows)
        })
        .await
    }

    pub async fn clear_tracked_tabs(&self) -> Result<()> {
        self.execute(|conn| {
            conn.execute("DELETE FROM tracked_tabs", [])
                .context("failed to clear tracked tabs")?;
            Ok(())
        })
        .await
    }
}
