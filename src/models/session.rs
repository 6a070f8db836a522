use chrono::Local;
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Server-assigned session id (`sid`).
pub type SessionId = i64;
/// Server-assigned tab tracking id (`tid`).
pub type TabId = i64;
/// Tab handle assigned by the browser.
pub type TabHandle = i64;

/// Body of `POST /api/session/start`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionMetadata {
    pub browser_name: String,
    pub browser_version: String,
    pub platform: String,
    pub timezone: String,
}

impl SessionMetadata {
    /// Browser fields come from the extension; platform and timezone are
    /// read from the host machine.
    pub fn detect(browser_name: impl Into<String>, browser_version: impl Into<String>) -> Self {
        let platform = match (System::name(), System::os_version()) {
            (Some(name), Some(version)) => format!("{name} {version}"),
            (Some(name), None) => name,
            _ => std::env::consts::OS.to_string(),
        };

        Self {
            browser_name: browser_name.into(),
            browser_version: browser_version.into(),
            platform,
            timezone: Local::now().offset().to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SessionStarted {
    pub sid: SessionId,
}

#[derive(Debug, Deserialize)]
pub struct TabOpened {
    pub tid: TabId,
}
