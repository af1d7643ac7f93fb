// Copyright (c) 2024 Mike Tsao. All rights reserved.

use std::time::{Duration, Instant};

/// Collapses bursts into one accepted event per window. The window starts at
/// the accepted event and resets itself once it has passed.
#[derive(Debug, Clone)]
pub struct Debounce {
    window: Duration,
    accepted_at: Option<Instant>,
}
impl Default for Debounce {
    fn default() -> Self {
        Self::new_with(Self::DEFAULT_WINDOW)
    }
}
impl Debounce {
    /// How long MIDI-triggered work is locked out after it runs.
    pub const DEFAULT_WINDOW: Duration = Duration::from_millis(1000);

    #[allow(missing_docs)]
    pub fn new_with(window: Duration) -> Self {
        Self {
            window,
            accepted_at: None,
        }
    }

    /// Returns true and opens a new window if no window is open at `now`.
    pub fn try_accept(&mut self, now: Instant) -> bool {
        if self.is_busy(now) {
            return false;
        }
        self.accepted_at = Some(now);
        true
    }

    /// Whether an accepted event's window is still open at `now`.
    pub fn is_busy(&self, now: Instant) -> bool {
        self.accepted_at
            .is_some_and(|at| now.saturating_duration_since(at) < self.window)
    }
}
