use std::collections::VecDeque;
use std::time::Instant;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::config::CircuitSettings;

/// Consecutive healthy prober results required to leave OPEN before the
/// cooldown elapses.
const PROBE_PROMOTION_STREAK: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

/// Sliding window of call outcomes; `true` marks a failure.
struct OutcomeWindow {
    outcomes: VecDeque<bool>,
    capacity: usize,
}

impl OutcomeWindow {
    fn new(capacity: usize) -> Self {
        Self {
            outcomes: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn record(&mut self, failure: bool) {
        if self.outcomes.len() == self.capacity {
            self.outcomes.pop_front();
        }
        self.outcomes.push_back(failure);
    }

    fn observed(&self) -> usize {
        self.outcomes.len()
    }

    fn failure_fraction(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let failures = self.outcomes.iter().filter(|failed| **failed).count();
        failures as f64 / self.outcomes.len() as f64
    }

    fn reset(&mut self) {
        self.outcomes.clear();
    }
}

struct BreakerInner {
    state: CircuitState,
    window: OutcomeWindow,
    opened_at: Instant,
    probe_streak: u32,
    half_open_permits: u32,
    half_open_successes: u32,
}

/// Three-state breaker guarding every call to the shared datastore.
///
/// CLOSED tracks outcomes over a sliding window and trips once the failed
/// fraction reaches the threshold after a minimum number of observations.
/// OPEN short-circuits callers onto the fallback mirror until the cooldown
/// elapses, or earlier when the liveness prober reports sustained success.
/// HALF_OPEN admits a bounded number of trial calls; any failure reopens,
/// a full set of successes closes.
pub struct CircuitBreaker {
    settings: CircuitSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(settings: CircuitSettings) -> Self {
        let window = OutcomeWindow::new(settings.window_size);
        Self {
            settings,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                window,
                opened_at: Instant::now(),
                probe_streak: 0,
                half_open_permits: 0,
                half_open_successes: 0,
            }),
        }
    }

    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether the next backend call may be attempted. In OPEN this also
    /// performs the cooldown-elapsed transition into HALF_OPEN, consuming
    /// the first trial permit.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if inner.opened_at.elapsed() >= self.settings.open_duration {
                    Self::transition(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_permits = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_permits < self.settings.half_open_probes {
                    inner.half_open_permits += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => inner.window.record(false),
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.settings.half_open_probes {
                    Self::transition(&mut inner, CircuitState::Closed);
                }
            }
            // Late result from a call granted before the trip; the next
            // prober cycle carries the signal instead.
            CircuitState::Open => {}
        }
    }

    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.window.record(true);
                if inner.window.observed() >= self.settings.min_calls
                    && inner.window.failure_fraction() >= self.settings.failure_rate_threshold
                {
                    Self::transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => Self::transition(&mut inner, CircuitState::Open),
            CircuitState::Open => {}
        }
    }

    /// Feed a liveness-prober result into the state machine.
    ///
    /// In OPEN, sustained success promotes to HALF_OPEN before the cooldown
    /// elapses, while every failure restarts the cooldown so a dead backend
    /// keeps the circuit open indefinitely.
    pub fn record_probe(&self, healthy: bool) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.window.record(!healthy);
                if !healthy
                    && inner.window.observed() >= self.settings.min_calls
                    && inner.window.failure_fraction() >= self.settings.failure_rate_threshold
                {
                    Self::transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::Open => {
                if healthy {
                    inner.probe_streak += 1;
                    if inner.probe_streak >= PROBE_PROMOTION_STREAK {
                        Self::transition(&mut inner, CircuitState::HalfOpen);
                    }
                } else {
                    inner.probe_streak = 0;
                    inner.opened_at = Instant::now();
                }
            }
            CircuitState::HalfOpen => {
                if healthy {
                    inner.half_open_successes += 1;
                    if inner.half_open_successes >= self.settings.half_open_probes {
                        Self::transition(&mut inner, CircuitState::Closed);
                    }
                } else {
                    Self::transition(&mut inner, CircuitState::Open);
                }
            }
        }
    }

    fn transition(inner: &mut BreakerInner, next: CircuitState) {
        let from = inner.state;
        if from == next {
            return;
        }
        inner.state = next;
        match next {
            CircuitState::Open => {
                inner.opened_at = Instant::now();
                inner.probe_streak = 0;
                inner.window.reset();
                warn!(from = from.as_str(), "circuit breaker opened; serving from in-memory mirror");
            }
            CircuitState::HalfOpen => {
                inner.half_open_permits = 0;
                inner.half_open_successes = 0;
                info!(from = from.as_str(), "circuit breaker half-open; admitting trial calls");
            }
            CircuitState::Closed => {
                inner.window.reset();
                info!(from = from.as_str(), "circuit breaker closed; shared store is authoritative");
            }
        }
    }
}
