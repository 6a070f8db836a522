pub mod auth;
pub mod dashboard;
pub mod event;
pub mod session;

pub use auth::{AuthToken, UserProfile};
pub use dashboard::{
    AdminStats, AdminUser, Analytics, CategoryTotal, DomainSummary, DriftEvent, Insights,
    WhitelistEntry,
};
pub use event::{Activity, ActivityEvent, EventBatch, EventKind};
pub use session::{SessionId, SessionMetadata, TabHandle, TabId};
