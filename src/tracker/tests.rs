use std::{sync::Arc, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use tempfile::TempDir;
use tokio::time;

use super::{ActivityOutcome, Recovery, SessionPhase, TrackerController};
use crate::{
    api::fake::{ApiCall, RecordingApi},
    db::{test_support::temp_database, Database},
    models::{Activity, AuthToken, SessionMetadata},
    settings::Settings,
    utils::clock::{Clock, SystemClock},
};

struct FixedClock(DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

struct Harness {
    controller: TrackerController,
    api: Arc<RecordingApi>,
    db: Database,
    _dir: TempDir,
}

async fn harness(logged_in: bool) -> Harness {
    harness_with_clock(logged_in, Arc::new(SystemClock)).await
}

async fn harness_with_clock(logged_in: bool, clock: Arc<dyn Clock>) -> Harness {
    let (db, dir) = temp_database();
    if logged_in {
        db.store_credentials(&AuthToken {
            access_token: "token-abc".into(),
            token_type: "bearer".into(),
            user_id: 7,
            email: "ada@example.com".into(),
        })
        .await
        .unwrap();
    }

    let api = RecordingApi::new();
    let controller = TrackerController::with_clock(api.clone(), db.clone(), Settings::default(), clock);
    Harness {
        controller,
        api,
        db,
        _dir: dir,
    }
}

fn metadata() -> SessionMetadata {
    SessionMetadata::detect("Chrome", "120.0")
}

fn mouse(n: i32) -> Activity {
    Activity::MouseMove {
        mouse_x: n,
        mouse_y: 0,
        target_element_id: None,
        url: None,
    }
}

fn mouse_x(activity: &Activity) -> i32 {
    match activity {
        Activity::MouseMove { mouse_x, .. } => *mouse_x,
        other => panic!("expected a mouse move, got {other:?}"),
    }
}

fn is_open_tab(call: &ApiCall) -> bool {
    matches!(call, ApiCall::OpenTab { .. })
}

#[tokio::test(start_paused = true)]
async fn test_batch_sent_when_full_and_not_again() {
    let h = harness(true).await;
    h.controller.start_session(Some(metadata())).await.unwrap();

    for n in 1..=19 {
        assert!(h.controller.enqueue(1, mouse(n)).await);
    }
    assert!(h.api.batches().is_empty());
    assert_eq!(h.controller.snapshot().await.pending_events, 19);

    assert!(h.controller.enqueue(1, mouse(20)).await);
    let batches = h.api.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].session_id, 100);
    assert_eq!(batches[0].events.len(), 20);

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.pending_events, 0);
    assert!(!snapshot.idle_flush_armed);

    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.api.batches().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_idle_flush_after_quiet_period() {
    let h = harness(true).await;
    h.controller.start_session(Some(metadata())).await.unwrap();

    for n in 1..=5 {
        h.controller.enqueue(1, mouse(n)).await;
    }
    assert!(h.controller.snapshot().await.idle_flush_armed);

    time::sleep(Duration::from_secs(29)).await;
    assert!(h.api.batches().is_empty());

    time::sleep(Duration::from_secs(2)).await;
    let batches = h.api.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].events.len(), 5);
    assert!(!h.controller.snapshot().await.idle_flush_armed);
}

#[tokio::test(start_paused = true)]
async fn test_idle_flush_restarts_on_each_event() {
    let h = harness(true).await;
    h.controller.start_session(Some(metadata())).await.unwrap();

    h.controller.enqueue(1, mouse(1)).await;
    time::sleep(Duration::from_secs(20)).await;
    h.controller.enqueue(1, mouse(2)).await;
    time::sleep(Duration::from_secs(20)).await;
    assert!(h.api.batches().is_empty());

    time::sleep(Duration::from_secs(11)).await;
    let batches = h.api.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].events.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_steady_mouse_stream_splits_into_two_batches() {
    let h = harness(true).await;
    let tid = h
        .controller
        .resolve_or_create_tab(4, "https://example.com/docs", Some("Docs"))
        .await
        .unwrap()
        .unwrap();

    for n in 1..=25 {
        if n > 1 {
            time::sleep(Duration::from_millis(1200)).await;
        }
        assert_eq!(
            h.controller.record_activity(4, mouse(n)).await,
            ActivityOutcome::Queued
        );
    }

    let batches = h.api.batches();
    assert_eq!(batches.len(), 1);
    let first: Vec<i32> = batches[0].events.iter().map(|e| mouse_x(&e.activity)).collect();
    assert_eq!(first, (1..=20).collect::<Vec<_>>());
    assert!(batches[0].events.iter().all(|e| e.tab_id == tid));

    time::sleep(Duration::from_secs(29)).await;
    assert_eq!(h.api.batches().len(), 1);

    time::sleep(Duration::from_secs(2)).await;
    let batches = h.api.batches();
    assert_eq!(batches.len(), 2);
    let second: Vec<i32> = batches[1].events.iter().map(|e| mouse_x(&e.activity)).collect();
    assert_eq!(second, (21..=25).collect::<Vec<_>>());
}

#[tokio::test(start_paused = true)]
async fn test_high_frequency_activity_is_throttled() {
    let h = harness(true).await;
    h.controller
        .resolve_or_create_tab(4, "https://example.com", None)
        .await
        .unwrap();

    assert_eq!(h.controller.record_activity(4, mouse(1)).await, ActivityOutcome::Queued);
    time::sleep(Duration::from_millis(400)).await;
    assert_eq!(h.controller.record_activity(4, mouse(2)).await, ActivityOutcome::Throttled);

    let click = Activity::Click {
        mouse_x: 5,
        mouse_y: 5,
        target_element_id: Some("submit".into()),
        url: None,
    };
    assert_eq!(h.controller.record_activity(4, click).await, ActivityOutcome::Queued);

    time::sleep(Duration::from_millis(700)).await;
    assert_eq!(h.controller.record_activity(4, mouse(3)).await, ActivityOutcome::Queued);
    assert_eq!(h.controller.snapshot().await.pending_events, 3);
}

#[tokio::test]
async fn test_activity_for_unknown_tab_is_untracked() {
    let h = harness(true).await;
    assert_eq!(h.controller.record_activity(9, mouse(1)).await, ActivityOutcome::Untracked);
    assert!(!h.controller.focus_tab(9).await);
}

#[tokio::test]
async fn test_duplicate_resolve_opens_one_tab() {
    let h = harness(true).await;

    let first = h
        .controller
        .resolve_or_create_tab(4, "https://example.com", Some("Example"))
        .await
        .unwrap();
    let second = h
        .controller
        .resolve_or_create_tab(4, "https://example.com/other", None)
        .await
        .unwrap();

    assert_eq!(first, Some(1));
    assert_eq!(second, Some(1));
    assert_eq!(h.api.count(is_open_tab), 1);
    assert_eq!(h.api.count(|c| matches!(c, ApiCall::StartSession(_))), 1);
}

#[tokio::test]
async fn test_untitled_tab_gets_default_title() {
    let h = harness(true).await;
    h.controller
        .resolve_or_create_tab(4, "https://example.com", Some("  "))
        .await
        .unwrap();

    let calls = h.api.calls();
    assert!(calls.contains(&ApiCall::OpenTab {
        session_id: 100,
        url: "https://example.com".into(),
        title: "New Tab".into(),
    }));
}

#[tokio::test]
async fn test_non_web_urls_are_ignored() {
    let h = harness(true).await;

    for url in ["chrome://settings", "file:///x"] {
        let tid = h.controller.resolve_or_create_tab(4, url, None).await.unwrap();
        assert_eq!(tid, None);
    }

    assert!(h.api.calls().is_empty());
    assert_eq!(h.controller.snapshot().await.tracked_tabs, 0);
}

#[tokio::test]
async fn test_without_credential_tracking_is_inert() {
    let h = harness(false).await;

    assert_eq!(h.controller.start_session(Some(metadata())).await.unwrap(), None);
    let tid = h
        .controller
        .resolve_or_create_tab(4, "https://example.com", None)
        .await
        .unwrap();
    assert_eq!(tid, None);
    assert!(!h.controller.enqueue(1, Activity::TabFocus).await);
    assert_eq!(h.controller.recover(None).await.unwrap(), Recovery::Inert);

    assert!(h.api.calls().is_empty());
    assert_eq!(h.controller.snapshot().await.phase, SessionPhase::NoSession);
}

#[tokio::test]
async fn test_refused_session_start_leaves_no_session() {
    let h = harness(true).await;
    h.api.set_fail_sessions(true);

    assert_eq!(h.controller.start_session(Some(metadata())).await.unwrap(), None);
    assert_eq!(h.controller.snapshot().await.phase, SessionPhase::NoSession);
    assert_eq!(h.db.session_id().await.unwrap(), None);

    h.api.set_fail_sessions(false);
    assert_eq!(h.controller.start_session(None).await.unwrap(), Some(100));
}

#[tokio::test]
async fn test_events_before_session_are_dropped() {
    let h = harness(true).await;

    assert!(!h.controller.enqueue(1, Activity::TabFocus).await);
    h.controller.start_session(Some(metadata())).await.unwrap();
    assert!(h.controller.enqueue(1, Activity::TabFocus).await);

    assert_eq!(h.controller.flush().await, 1);
    let batches = h.api.batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].events.len(), 1);
}

#[tokio::test]
async fn test_start_session_is_idempotent() {
    let h = harness(true).await;
    let first = h.controller.start_session(Some(metadata())).await.unwrap();
    let second = h.controller.start_session(Some(metadata())).await.unwrap();

    assert_eq!(first, Some(100));
    assert_eq!(second, Some(100));
    assert_eq!(h.api.count(|c| matches!(c, ApiCall::StartSession(_))), 1);
    assert_eq!(h.db.session_id().await.unwrap(), Some(100));
}

#[tokio::test(start_paused = true)]
async fn test_close_flushes_before_closing() {
    let h = harness(true).await;
    h.controller
        .resolve_or_create_tab(4, "https://example.com", None)
        .await
        .unwrap();
    for n in 1..=5 {
        h.controller.enqueue(1, mouse(n)).await;
    }

    assert!(h.controller.close_session().await.unwrap());

    let calls = h.api.calls();
    let batch_at = calls
        .iter()
        .position(|c| matches!(c, ApiCall::SendBatch(b) if b.events.len() == 5))
        .unwrap();
    let close_at = calls
        .iter()
        .position(|c| *c == ApiCall::CloseSession(100))
        .unwrap();
    assert!(batch_at < close_at);

    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::NoSession);
    assert_eq!(snapshot.tracked_tabs, 0);
    assert_eq!(snapshot.pending_events, 0);
    assert!(!snapshot.idle_flush_armed);
    assert_eq!(h.db.session_id().await.unwrap(), None);
    assert!(h.db.tracked_tabs_for_session(100).await.unwrap().is_empty());

    assert!(!h.controller.enqueue(1, Activity::TabFocus).await);
    assert!(!h.controller.close_session().await.unwrap());

    time::sleep(Duration::from_secs(60)).await;
    assert_eq!(h.api.batches().len(), 1);
}

#[tokio::test]
async fn test_failed_batch_is_not_retried() {
    let h = harness(true).await;
    h.controller.start_session(Some(metadata())).await.unwrap();
    h.api.set_fail_batches(true);

    for n in 1..=20 {
        h.controller.enqueue(1, mouse(n)).await;
    }
    assert_eq!(h.api.batches().len(), 1);
    assert_eq!(h.controller.snapshot().await.pending_events, 0);

    h.api.set_fail_batches(false);
    assert_eq!(h.controller.flush().await, 0);
    assert_eq!(h.api.batches().len(), 1);
}

#[tokio::test]
async fn test_release_tab_closes_on_backend() {
    let h = harness(true).await;
    let tid = h
        .controller
        .resolve_or_create_tab(4, "https://example.com", None)
        .await
        .unwrap()
        .unwrap();

    assert!(h.controller.release_tab(4).await.unwrap());
    assert!(!h.controller.release_tab(4).await.unwrap());

    assert_eq!(h.api.count(|c| *c == ApiCall::CloseTab(tid)), 1);
    assert_eq!(h.controller.snapshot().await.tracked_tabs, 0);
    assert!(h.db.tracked_tabs_for_session(100).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_close_racing_open_leaves_no_orphan() {
    let h = harness(true).await;
    let opener = h.controller.clone();
    let closer = h.controller.clone();

    let (opened, released) = tokio::join!(
        opener.resolve_or_create_tab(4, "https://example.com", None),
        closer.release_tab(4),
    );

    assert_eq!(opened.unwrap(), Some(1));
    assert!(released.unwrap());

    let calls = h.api.calls();
    let open_at = calls.iter().position(is_open_tab).unwrap();
    let close_at = calls.iter().position(|c| *c == ApiCall::CloseTab(1)).unwrap();
    assert!(open_at < close_at);
    assert_eq!(h.controller.snapshot().await.tracked_tabs, 0);
}

#[tokio::test]
async fn test_navigation_records_url_change() {
    let h = harness(true).await;

    h.controller
        .tab_updated(4, Some("https://example.com/a"), Some("A"), true)
        .await
        .unwrap();
    h.controller
        .tab_updated(4, Some("https://example.com/b"), None, false)
        .await
        .unwrap();
    h.controller.tab_updated(4, None, None, true).await.unwrap();

    assert_eq!(h.api.count(is_open_tab), 1);
    h.controller.flush().await;
    let batches = h.api.batches();
    let urls: Vec<&Activity> = batches[0].events.iter().map(|e| &e.activity).collect();
    assert_eq!(
        urls,
        vec![
            &Activity::UrlChange {
                url: "https://example.com/a".into()
            },
            &Activity::UrlChange {
                url: "https://example.com/b".into()
            },
        ]
    );
}

#[tokio::test]
async fn test_navigation_off_the_web_releases_tab() {
    let h = harness(true).await;
    h.controller
        .tab_updated(4, Some("https://example.com"), None, true)
        .await
        .unwrap();

    h.controller
        .tab_updated(4, Some("chrome://newtab"), None, true)
        .await
        .unwrap();

    assert_eq!(h.api.count(|c| *c == ApiCall::CloseTab(1)), 1);
    assert_eq!(h.controller.snapshot().await.tracked_tabs, 0);
}

#[tokio::test]
async fn test_focus_records_tab_focus() {
    let h = harness(true).await;
    h.controller
        .resolve_or_create_tab(4, "https://example.com", None)
        .await
        .unwrap();

    assert!(h.controller.focus_tab(4).await);
    h.controller.flush().await;
    assert_eq!(h.api.batches()[0].events[0].activity, Activity::TabFocus);
}

#[tokio::test]
async fn test_timestamps_come_from_clock() {
    let at = Utc.with_ymd_and_hms(2024, 3, 9, 14, 30, 0).unwrap();
    let h = harness_with_clock(true, Arc::new(FixedClock(at))).await;
    h.controller.start_session(Some(metadata())).await.unwrap();

    h.controller.enqueue(1, Activity::TabFocus).await;
    h.controller.flush().await;

    assert_eq!(h.api.batches()[0].events[0].timestamp, at);
}

#[tokio::test]
async fn test_recover_rejoins_persisted_session() {
    let h = harness(true).await;
    h.controller
        .resolve_or_create_tab(4, "https://example.com", None)
        .await
        .unwrap();
    h.controller
        .resolve_or_create_tab(5, "https://example.org", None)
        .await
        .unwrap();
    h.controller.shutdown().await;

    let api = RecordingApi::new();
    let restarted = TrackerController::new(api.clone(), h.db.clone(), Settings::default());
    let recovery = restarted.recover(Some(metadata())).await.unwrap();

    assert_eq!(
        recovery,
        Recovery::Rejoined {
            session_id: 100,
            tabs: 2
        }
    );
    let tid = restarted
        .resolve_or_create_tab(5, "https://example.org", None)
        .await
        .unwrap();
    assert_eq!(tid, Some(2));
    assert!(api.calls().is_empty());

    assert!(restarted.focus_tab(4).await);
    restarted.flush().await;
    assert_eq!(api.batches()[0].session_id, 100);
}

#[tokio::test]
async fn test_recover_starts_fresh_session_with_credential() {
    let h = harness(true).await;
    let recovery = h.controller.recover(Some(metadata())).await.unwrap();

    assert_eq!(recovery, Recovery::Started { session_id: 100 });
    assert_eq!(h.db.session_id().await.unwrap(), Some(100));
}

#[tokio::test]
async fn test_shutdown_flushes_and_keeps_session() {
    let h = harness(true).await;
    h.controller.start_session(Some(metadata())).await.unwrap();
    h.controller.enqueue(1, Activity::TabFocus).await;

    assert_eq!(h.controller.shutdown().await, 1);
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.phase, SessionPhase::Active(100));
    assert!(!snapshot.idle_flush_armed);
    assert_eq!(h.db.session_id().await.unwrap(), Some(100));
}

#[tokio::test]
async fn test_browser_start_replaces_persisted_session() {
    let h = harness(true).await;
    h.db.set_session_id(55).await.unwrap();
    h.db.upsert_tracked_tab(4, 999, 55).await.unwrap();

    let recovery = h.controller.begin_browser_run(Some(metadata())).await.unwrap();
    assert_eq!(recovery, Recovery::Started { session_id: 100 });
    assert!(h.db.tracked_tabs_for_session(55).await.unwrap().is_empty());
    assert_eq!(h.db.session_id().await.unwrap(), Some(100));

    // Handle 4 belongs to a new page in this browser run.
    let tid = h
        .controller
        .resolve_or_create_tab(4, "https://new-page.example", None)
        .await
        .unwrap();
    assert_eq!(tid, Some(1));

    let calls = h.api.calls();
    assert_eq!(calls[0], ApiCall::CloseSession(55));
    assert!(matches!(calls[1], ApiCall::StartSession(_)));
    assert_eq!(
        calls[2],
        ApiCall::OpenTab {
            session_id: 100,
            url: "https://new-page.example".into(),
            title: "New Tab".into(),
        }
    );
}

#[tokio::test]
async fn test_browser_start_closes_live_session() {
    let h = harness(true).await;
    h.controller
        .resolve_or_create_tab(4, "https://example.com", None)
        .await
        .unwrap();
    h.controller.focus_tab(4).await;

    let recovery = h.controller.begin_browser_run(None).await.unwrap();

    assert_eq!(recovery, Recovery::Started { session_id: 101 });
    assert_eq!(h.api.batches()[0].session_id, 100);
    assert_eq!(h.api.count(|c| *c == ApiCall::CloseSession(100)), 1);
    let snapshot = h.controller.snapshot().await;
    assert_eq!(snapshot.tracked_tabs, 0);
    assert_eq!(snapshot.phase, SessionPhase::Active(101));
}

#[tokio::test]
async fn test_browser_start_without_credential_is_inert() {
    let h = harness(false).await;
    h.db.set_session_id(55).await.unwrap();

    let recovery = h.controller.begin_browser_run(None).await.unwrap();

    assert_eq!(recovery, Recovery::Inert);
    assert_eq!(h.db.session_id().await.unwrap(), None);
    assert_eq!(h.api.calls(), vec![ApiCall::CloseSession(55)]);
}
