//! Line protocol between the browser extension and the tracking host.

use serde::{Deserialize, Serialize};

use crate::models::{Activity, TabHandle};
use crate::tracker::{Recovery, TrackerSnapshot};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserMessage {
    /// Browser launched with the extension loaded.
    Startup {
        #[serde(default)]
        browser_name: Option<String>,
        #[serde(default)]
        browser_version: Option<String>,
    },
    /// Extension installed or updated.
    Installed {
        #[serde(default)]
        browser_name: Option<String>,
        #[serde(default)]
        browser_version: Option<String>,
    },
    /// Extension attached to a restarted host while the browser kept
    /// running, so tab handles still name the same tabs.
    Connect {
        #[serde(default)]
        browser_name: Option<String>,
        #[serde(default)]
        browser_version: Option<String>,
    },
    WindowRemoved {
        remaining_windows: usize,
    },
    TabCreated {
        tab: TabHandle,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        title: Option<String>,
    },
    TabUpdated {
        tab: TabHandle,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        title: Option<String>,
        /// `"loading"` or `"complete"`.
        #[serde(default)]
        status: Option<String>,
    },
    TabRemoved {
        tab: TabHandle,
    },
    TabActivated {
        tab: TabHandle,
    },
    /// In-page activity from the content script.
    Activity {
        #[serde(default)]
        tab: Option<TabHandle>,
        data: Activity,
    },
    Flush,
    Status,
    Shutdown,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostReply {
    Ack,
    Session {
        recovery: Recovery,
    },
    Activity {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Flushed {
        events: usize,
    },
    Status {
        snapshot: TrackerSnapshot,
    },
    Error {
        message: String,
    },
}

impl HostReply {
    pub fn activity_ok() -> Self {
        HostReply::Activity {
            success: true,
            error: None,
        }
    }

    pub fn activity_rejected(reason: &str) -> Self {
        HostReply::Activity {
            success: false,
            error: Some(reason.to_string()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        HostReply::Error {
            message: message.into(),
        }
    }
}
