use anyhow::Result;

use super::messages::{BrowserMessage, HostReply};
use crate::{
    models::SessionMetadata,
    tracker::{ActivityOutcome, TrackerController},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Flow {
    Continue,
    Stop,
}

pub(super) async fn dispatch(
    controller: &TrackerController,
    message: BrowserMessage,
) -> Result<(HostReply, Flow)> {
    let reply = match message {
        BrowserMessage::Startup {
            browser_name,
            browser_version,
        } => {
            let recovery = controller
                .begin_browser_run(browser_metadata(browser_name, browser_version))
                .await?;
            log_info!("Browser started: {recovery:?}");
            HostReply::Session { recovery }
        }
        BrowserMessage::Installed {
            browser_name,
            browser_version,
        }
        | BrowserMessage::Connect {
            browser_name,
            browser_version,
        } => {
            let recovery = controller
                .recover(browser_metadata(browser_name, browser_version))
                .await?;
            log_info!("Browser connected: {recovery:?}");
            HostReply::Session { recovery }
        }
        BrowserMessage::WindowRemoved { remaining_windows } => {
            if remaining_windows == 0 {
                controller.close_session().await?;
            } else {
                log_debug!("Window closed, {remaining_windows} remaining");
            }
            HostReply::Ack
        }
        BrowserMessage::TabCreated { tab, url, title } => {
            if let Some(url) = url.as_deref() {
                controller
                    .resolve_or_create_tab(tab, url, title.as_deref())
                    .await?;
            }
            HostReply::Ack
        }
        BrowserMessage::TabUpdated {
            tab,
            url,
            title,
            status,
        } => {
            let loading = status.as_deref() == Some("loading");
            controller
                .tab_updated(tab, url.as_deref(), title.as_deref(), loading)
                .await?;
            HostReply::Ack
        }
        BrowserMessage::TabRemoved { tab } => {
            controller.release_tab(tab).await?;
            HostReply::Ack
        }
        BrowserMessage::TabActivated { tab } => {
            if !controller.focus_tab(tab).await {
                log_debug!("Activated tab {tab} is not tracked");
            }
            HostReply::Ack
        }
        BrowserMessage::Activity { tab, data } => {
            let Some(tab) = tab else {
                return Ok((HostReply::activity_rejected("No tab ID"), Flow::Continue));
            };
            match controller.record_activity(tab, data).await {
                ActivityOutcome::Queued | ActivityOutcome::Throttled => HostReply::activity_ok(),
                ActivityOutcome::Untracked => HostReply::activity_rejected("Tab not tracked"),
                ActivityOutcome::NoSession => HostReply::activity_rejected("No active session"),
            }
        }
        BrowserMessage::Flush => HostReply::Flushed {
            events: controller.flush().await,
        },
        BrowserMessage::Status => HostReply::Status {
            snapshot: controller.snapshot().await,
        },
        BrowserMessage::Shutdown => return Ok((HostReply::Ack, Flow::Stop)),
    };

    Ok((reply, Flow::Continue))
}

fn browser_metadata(
    browser_name: Option<String>,
    browser_version: Option<String>,
) -> Option<SessionMetadata> {
    browser_name.map(|name| {
        SessionMetadata::detect(name, browser_version.unwrap_or_else(|| "unknown".into()))
    })
}
