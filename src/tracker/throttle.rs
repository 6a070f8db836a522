use std::{collections::HashMap, time::Duration};

use tokio::time::Instant;

use crate::models::{EventKind, TabHandle};

/// Rate limit for high-frequency in-page events: at most one mouse move and
/// one scroll per tab per window. Other kinds always pass.
pub struct ActivityThrottle {
    window: Duration,
    last_admitted: HashMap<(TabHandle, EventKind), Instant>,
}

impl ActivityThrottle {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_admitted: HashMap::new(),
        }
    }

    pub fn admit(&mut self, handle: TabHandle, kind: EventKind, now: Instant) -> bool {
        if !matches!(kind, EventKind::MouseMove | EventKind::Scroll) || self.window.is_zero() {
            return true;
        }

        match self.last_admitted.get(&(handle, kind)) {
            Some(last) if now.saturating_duration_since(*last) < self.window => false,
            _ => {
                self.last_admitted.insert((handle, kind), now);
                true
            }
        }
    }

    pub fn forget_tab(&mut self, handle: TabHandle) {
        self.last_admitted.retain(|(tab, _), _| *tab != handle);
    }

    pub fn clear(&mut self) {
        self.last_admitted.clear();
    }
}
