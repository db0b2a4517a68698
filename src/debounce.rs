use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

/// After a user write, the cloud's view lags behind the local optimistic
/// value for roughly this long; polling inside the window would clobber it.
pub(crate) const DEFAULT_DEBOUNCE_WINDOW: Duration = Duration::from_secs(15);

/// Suppresses scheduled polls in a trailing window after user-initiated
/// writes. Forced polls always pass.
#[derive(Debug)]
pub struct DebounceGate {
    window: Duration,
    last_interaction: Mutex<Option<Instant>>,
}

impl DebounceGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_interaction: Mutex::new(None),
        }
    }

    pub fn record_interaction(&self) {
        *self
            .last_interaction
            .lock()
            .expect("debounce state poisoned") = Some(Instant::now());
    }

    pub fn should_skip(&self, forced: bool) -> bool {
        if forced {
            return false;
        }
        self.last_interaction
            .lock()
            .expect("debounce state poisoned")
            .is_some_and(|at| at.elapsed() < self.window)
    }
}

impl Default for DebounceGate {
    fn default() -> Self {
        Self::new(DEFAULT_DEBOUNCE_WINDOW)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    #[tokio::test(start_paused = true)]
    async fn no_interaction_never_skips() {
        let gate = DebounceGate::default();
        assert!(!gate.should_skip(false));
    }

    #[tokio::test(start_paused = true)]
    async fn skips_inside_window_allows_after() {
        let gate = DebounceGate::default();
        gate.record_interaction();
        assert!(gate.should_skip(false));

        advance(Duration::from_millis(14_999)).await;
        assert!(gate.should_skip(false));

        advance(Duration::from_millis(1)).await;
        assert!(!gate.should_skip(false));
    }

    #[tokio::test(start_paused = true)]
    async fn forced_always_passes() {
        let gate = DebounceGate::default();
        gate.record_interaction();
        assert!(!gate.should_skip(true));
    }

    #[tokio::test(start_paused = true)]
    async fn new_interaction_restarts_window() {
        let gate = DebounceGate::new(Duration::from_secs(15));
        gate.record_interaction();
        advance(Duration::from_secs(10)).await;
        gate.record_interaction();
        advance(Duration::from_secs(10)).await;
        assert!(gate.should_skip(false));
    }
}
