//! Buffer of activity events awaiting `/api/events/batch`, plus the
//! debounced idle-flush timer that belongs to it.

use tokio::task::JoinHandle;

use crate::models::ActivityEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The batch reached its size limit.
    FlushNow,
    /// Keep buffering; (re)arm the idle timer.
    ArmIdle,
}

pub struct EventBatcher {
    pending: Vec<ActivityEvent>,
    batch_size: usize,
    pub(crate) idle: IdleTimer,
}

impl EventBatcher {
    pub fn new(batch_size: usize) -> Self {
        let batch_size = batch_size.max(1);
        Self {
            pending: Vec::with_capacity(batch_size),
            batch_size,
            idle: IdleTimer::default(),
        }
    }

    pub fn push(&mut self, event: ActivityEvent) -> PushOutcome {
        self.pending.push(event);
        if self.pending.len() >= self.batch_size {
            PushOutcome::FlushNow
        } else {
            PushOutcome::ArmIdle
        }
    }

    /// Swaps the buffer for an empty one. `None` when nothing is pending,
    /// so an empty batch can never be sent.
    pub fn take(&mut self) -> Option<Vec<ActivityEvent>> {
        if self.pending.is_empty() {
            return None;
        }
        Some(std::mem::replace(
            &mut self.pending,
            Vec::with_capacity(self.batch_size),
        ))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// A re-armable one-shot timer task. Each arm gets a generation number; a
/// task that wakes up under a stale generation must do nothing.
#[derive(Default)]
pub struct IdleTimer {
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl IdleTimer {
    pub fn arm(&mut self, spawn: impl FnOnce(u64) -> JoinHandle<()>) {
        self.cancel();
        self.handle = Some(spawn(self.generation));
    }

    pub fn cancel(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Called by the timer task itself. Returns whether `generation` is
    /// still the live arm, and if so disarms without aborting the caller.
    pub fn fire(&mut self, generation: u64) -> bool {
        if generation != self.generation {
            return false;
        }
        self.handle = None;
        self.generation = self.generation.wrapping_add(1);
        true
    }

    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for IdleTimer {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Activity;
    use chrono::Utc;

    fn event(n: i32) -> ActivityEvent {
        ActivityEvent::new(
            1,
            Activity::MouseMove {
                mouse_x: n,
                mouse_y: n,
                target_element_id: None,
                url: None,
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_flush_signal_at_size_limit() {
        let mut batcher = EventBatcher::new(3);
        assert_eq!(batcher.push(event(1)), PushOutcome::ArmIdle);
        assert_eq!(batcher.push(event(2)), PushOutcome::ArmIdle);
        assert_eq!(batcher.push(event(3)), PushOutcome::FlushNow);
    }

    #[test]
    fn test_take_swaps_in_order_and_never_yields_empty() {
        let mut batcher = EventBatcher::new(20);
        assert!(batcher.take().is_none());

        for n in 0..5 {
            batcher.push(event(n));
        }
        let taken = batcher.take().unwrap();
        let xs: Vec<i32> = taken
            .iter()
            .map(|e| match e.activity {
                Activity::MouseMove { mouse_x, .. } => mouse_x,
                _ => unreachable!(),
            })
            .collect();
        assert_eq!(xs, vec![0, 1, 2, 3, 4]);
        assert!(batcher.is_empty());
        assert!(batcher.take().is_none());
    }

    #[tokio::test]
    async fn test_stale_generation_does_not_fire() {
        let mut timer = IdleTimer::default();
        let mut first = None;
        timer.arm(|generation| {
            first = Some(generation);
            tokio::spawn(async {})
        });
        let first = first.unwrap();

        let mut second = None;
        timer.arm(|generation| {
            second = Some(generation);
            tokio::spawn(async {})
        });
        let second = second.unwrap();

        assert_ne!(first, second);
        assert!(!timer.fire(first));
        assert!(timer.is_armed());
        assert!(timer.fire(second));
        assert!(!timer.is_armed());
        assert!(!timer.fire(second));
    }

    #[tokio::test]
    async fn test_cancel_disarms() {
        let mut timer = IdleTimer::default();
        let mut armed = 0;
        timer.arm(|generation| {
            armed = generation;
            tokio::spawn(std::future::pending::<()>())
        });
        timer.cancel();
        assert!(!timer.is_armed());
        assert!(!timer.fire(armed));
    }
}
