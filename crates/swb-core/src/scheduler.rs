//! Batched expiration scheduler — one coalesced timer per registry.
//!
//! Instead of a timer per namespace, a single tokio task sleeps until the
//! earliest known expiration (plus a capped slack so near-simultaneous
//! expirations are swept as one batch) and then runs a full registry sweep.
//! The sweep re-derives the next wake-up from current state, so a timer
//! that fires after being logically superseded is harmless.

use std::sync::Weak;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::trace;

use crate::registry::Registry;

/// Cap on the batching slack added to each scheduled sweep.
const MAX_SWEEP_SLACK: Duration = Duration::from_secs(3);

#[derive(Default)]
struct TimerState {
    /// When the pending timer will fire. Invariant: `Some` iff `handle` is.
    target: Option<Instant>,
    handle: Option<JoinHandle<()>>,
}

pub(crate) struct ExpirationScheduler {
    registry: Weak<Registry>,
    timer: Mutex<TimerState>,
}

impl ExpirationScheduler {
    pub(crate) fn new(registry: Weak<Registry>) -> Self {
        Self {
            registry,
            timer: Mutex::new(TimerState::default()),
        }
    }

    /// Ensure a sweep runs no later than `delay` from now, plus bounded
    /// slack. `None` means "never" and is a silent no-op. A pending timer
    /// that already fires in time is left untouched; a later one is
    /// cancelled and replaced. At most one timer is live at any time.
    pub(crate) fn request_wake_by(&self, delay: Option<Duration>) {
        let Some(delay) = delay else { return };

        let slack = (delay / 2).min(MAX_SWEEP_SLACK);
        let fire_at = Instant::now() + delay + slack;

        let mut timer = self.timer.lock();
        if let Some(current) = timer.target {
            if current <= fire_at {
                return;
            }
            if let Some(handle) = timer.handle.take() {
                handle.abort();
            }
        }

        timer.target = Some(fire_at);
        let registry = self.registry.clone();
        timer.handle = Some(tokio::spawn(async move {
            tokio::time::sleep_until(fire_at).await;
            if let Some(registry) = registry.upgrade() {
                registry.sweep();
            }
        }));
        trace!(delay_ms = delay.as_millis() as u64, "sweep timer armed");
    }

    /// Drop the pending timer. Called at the start of every sweep so the
    /// next wake-up is re-derived from current registry state.
    pub(crate) fn clear(&self) {
        let mut timer = self.timer.lock();
        timer.target = None;
        if let Some(handle) = timer.handle.take() {
            handle.abort();
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.timer.lock().target.is_some()
    }
}

impl Drop for ExpirationScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.timer.lock().handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detached() -> ExpirationScheduler {
        // Weak::new never upgrades; these tests exercise timer bookkeeping only.
        ExpirationScheduler::new(Weak::new())
    }

    #[tokio::test]
    async fn infinite_delay_is_a_noop() {
        let sched = detached();
        sched.request_wake_by(None);
        assert!(!sched.is_pending());
    }

    #[tokio::test]
    async fn earlier_request_replaces_pending_timer() {
        let sched = detached();
        sched.request_wake_by(Some(Duration::from_secs(60)));
        let first = sched.timer.lock().target.unwrap();

        sched.request_wake_by(Some(Duration::from_secs(1)));
        let second = sched.timer.lock().target.unwrap();
        assert!(second < first);
    }

    #[tokio::test]
    async fn later_request_leaves_pending_timer_untouched() {
        let sched = detached();
        sched.request_wake_by(Some(Duration::from_secs(1)));
        let first = sched.timer.lock().target.unwrap();

        sched.request_wake_by(Some(Duration::from_secs(60)));
        let second = sched.timer.lock().target.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn slack_is_capped() {
        let sched = detached();
        let before = Instant::now();
        sched.request_wake_by(Some(Duration::from_secs(100)));
        let target = sched.timer.lock().target.unwrap();
        // 100s delay would want 50s slack; it must be capped at 3s.
        assert!(target <= before + Duration::from_secs(104));
        assert!(target >= before + Duration::from_secs(100));
    }

    #[tokio::test]
    async fn clear_forgets_the_timer() {
        let sched = detached();
        sched.request_wake_by(Some(Duration::from_secs(5)));
        assert!(sched.is_pending());
        sched.clear();
        assert!(!sched.is_pending());
    }
}
