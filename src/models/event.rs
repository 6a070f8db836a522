//! Activity events as they travel from the browser to `/api/events/batch`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::{SessionId, TabId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    TabFocus,
    UrlChange,
    MouseMove,
    Scroll,
    Click,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::TabFocus => "TAB_FOCUS",
            EventKind::UrlChange => "URL_CHANGE",
            EventKind::MouseMove => "MOUSE_MOVE",
            EventKind::Scroll => "SCROLL",
            EventKind::Click => "CLICK",
        }
    }
}

/// Kind-specific payload of an activity event. Serialized flat, tagged by
/// `event_type`, which is the shape the backend stores per row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Activity {
    TabFocus,
    UrlChange {
        url: String,
    },
    MouseMove {
        mouse_x: i32,
        mouse_y: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_element_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Scroll {
        scroll_y_pixels: i64,
        scroll_y_percent: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Click {
        mouse_x: i32,
        mouse_y: i32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target_element_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
}

impl Activity {
    pub fn kind(&self) -> EventKind {
        match self {
            Activity::TabFocus => EventKind::TabFocus,
            Activity::UrlChange { .. } => EventKind::UrlChange,
            Activity::MouseMove { .. } => EventKind::MouseMove,
            Activity::Scroll { .. } => EventKind::Scroll,
            Activity::Click { .. } => EventKind::Click,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEvent {
    pub tab_id: TabId,
    #[serde(flatten)]
    pub activity: Activity,
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(tab_id: TabId, activity: Activity, timestamp: DateTime<Utc>) -> Self {
        Self {
            tab_id,
            activity,
            timestamp,
        }
    }
}

/// Body of `POST /api/events/batch`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EventBatch {
    pub session_id: SessionId,
    pub events: Vec<ActivityEvent>,
}
