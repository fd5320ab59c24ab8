//! Consecutive-failure circuit breaker.
//!
//! Two observable states. **Closed**: calls pass, each failure bumps the
//! counter and a success zeroes it. **Open**: once the counter reaches the
//! threshold, `open_until = now + cooldown` and every call is refused until
//! that instant passes. There is no probe state; the first call after the
//! cooldown is a normal attempt and its outcome updates the counter.
//!
//! All reads and updates go through one mutex so concurrent outcomes can't
//! under-count or race a reset.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

pub const DEFAULT_FAIL_THRESHOLD: u32 = 3;
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct State {
    consecutive_failures: u32,
    open_until: Option<Instant>,
}

/// Point-in-time view for health reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BreakerSnapshot {
    pub open: bool,
    pub consecutive_failures: u32,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    state: Mutex<State>,
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(DEFAULT_FAIL_THRESHOLD, DEFAULT_COOLDOWN)
    }
}

impl CircuitBreaker {
    /// `threshold` is clamped to at least 1.
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self { threshold: threshold.max(1), cooldown, state: Mutex::new(State::default()) }
    }

    /// Whether a call may go out right now.
    pub fn allow(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        !is_open(&state, Instant::now())
    }

    pub fn record(&self, success: bool) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if success {
            if state.consecutive_failures > 0 {
                info!(previous_failures = state.consecutive_failures, "generation breaker reset");
            }
            state.consecutive_failures = 0;
            state.open_until = None;
            return;
        }

        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        if state.consecutive_failures >= self.threshold {
            state.open_until = Some(Instant::now() + self.cooldown);
            warn!(
                consecutive_failures = state.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "generation breaker open"
            );
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        BreakerSnapshot {
            open: is_open(&state, Instant::now()),
            consecutive_failures: state.consecutive_failures,
        }
    }
}

fn is_open(state: &State, now: Instant) -> bool {
    state.open_until.is_some_and(|until| now < until)
}
