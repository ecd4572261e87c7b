use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    /// Capturing and uploading on cadence.
    #[default]
    Active,
    /// Session locked; only the lock state is polled.
    Suspended,
    /// Run window expired or shutdown requested. Absorbing.
    Terminated,
}

impl LoopState {
    /// Next state for one poll. `locked` is only consulted while the loop is still live.
    pub fn next(self, window_expired: bool, locked: impl FnOnce() -> bool) -> LoopState {
        match self {
            LoopState::Terminated => LoopState::Terminated,
            _ if window_expired => LoopState::Terminated,
            _ if locked() => LoopState::Suspended,
            _ => LoopState::Active,
        }
    }
}

/// How a capture loop run ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopOutcome {
    Completed,
    Cancelled,
}

/// Bounded lifetime of one capture loop run, measured on the monotonic clock.
#[derive(Debug, Clone, Copy)]
pub struct RunWindow {
    started: Instant,
    max: Duration,
}

impl RunWindow {
    pub fn start(max: Duration) -> Self {
        Self {
            started: Instant::now(),
            max,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.max
    }

    pub fn remaining(&self) -> Duration {
        self.max.saturating_sub(self.elapsed())
    }
}
