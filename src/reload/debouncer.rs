use std::time::Duration;

use tokio::time::Instant;

pub const DEBOUNCE_MS: u64 = 300;

/// How long the scheduler sleeps when nothing is pending.
const IDLE: Duration = Duration::from_secs(86400);

/// Pure trailing-edge debouncer: only handles timing.
///
/// Every [`touch`](Self::touch) restarts the quiet window; the debouncer is
/// ready once a full window has passed since the last touch. Callers pass
/// the current instant so the timing is testable without a clock.
#[derive(Debug, Clone)]
pub struct Debouncer {
    window: Duration,
    last_event: Option<Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_event: None,
        }
    }

    /// Record a qualifying event at `now`.
    pub fn touch(&mut self, now: Instant) {
        self.last_event = Some(now);
    }

    /// Forget any pending event.
    pub fn cancel(&mut self) {
        self.last_event = None;
    }

    pub fn is_pending(&self) -> bool {
        self.last_event.is_some()
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        self.last_event
            .is_some_and(|last| now.saturating_duration_since(last) >= self.window)
    }

    /// Consume the pending event if its window has elapsed.
    pub fn take_if_ready(&mut self, now: Instant) -> bool {
        if !self.is_ready(now) {
            return false;
        }
        self.last_event = None;
        true
    }

    /// Precise sleep duration until the pending event becomes ready.
    pub fn sleep_duration(&self, now: Instant) -> Duration {
        let Some(last) = self.last_event else {
            return IDLE;
        };
        self.window
            .saturating_sub(now.saturating_duration_since(last))
            .max(Duration::from_millis(1))
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEBOUNCE_MS))
    }
}
