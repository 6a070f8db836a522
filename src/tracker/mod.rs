pub mod batcher;
pub mod controller;
pub mod state;
pub mod throttle;

#[cfg(test)]
mod tests;

pub use controller::{ActivityOutcome, Recovery, TrackerController};
pub use state::{SessionPhase, TrackerSnapshot};

/// Only web pages are tracked; `chrome://`, `file://`, extension pages and
/// friends are ignored.
pub fn is_trackable(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some(),
        Err(_) => false,
    }
}
