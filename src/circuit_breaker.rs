//! Three-state failure gate in front of the upstream platform.
//!
//! Closed counts consecutive qualifying failures and opens at the
//! threshold. Open refuses admissions until the recovery timeout elapses,
//! observed lazily on the next admission check. Half-open admits probes
//! optimistically; the first success closes the breaker, the next
//! qualifying failure reopens it.
//!
//! A qualifying failure is a reply with no error code (transport) or a
//! 5xx code. Client errors and 429s never move the breaker.

use crate::clock::{Clock, MonotonicClock};
use crate::metrics::{
    Metrics, BREAKER_GAUGE_CLOSED, BREAKER_GAUGE_HALF_OPEN, BREAKER_GAUGE_OPEN,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn gauge_value(self) -> i64 {
        match self {
            Self::Closed => BREAKER_GAUGE_CLOSED,
            Self::Open => BREAKER_GAUGE_OPEN,
            Self::HalfOpen => BREAKER_GAUGE_HALF_OPEN,
        }
    }
}

/// Outcome of an admission check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    pub allowed: bool,
    pub phase: CircuitState,
    /// How long the breaker has been open, when refusing.
    pub open_for: Duration,
}

#[derive(Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, recovery_timeout: Duration::from_secs(30) }
    }
}

#[derive(Debug)]
struct BreakerState {
    phase: CircuitState,
    consecutive_failures: u32,
    opened_at_millis: u64,
}

/// Process-local circuit breaker. One mutex guards phase transitions so
/// admit/on_success/on_failure each execute atomically; the lock is never
/// held across an HTTP exchange.
pub struct CircuitBreaker {
    state: Mutex<BreakerState>,
    config: CircuitBreakerConfig,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker").field("state", &self.state).finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self::with_config(CircuitBreakerConfig::default(), metrics)
    }

    pub fn with_config(config: CircuitBreakerConfig, metrics: Arc<Metrics>) -> Self {
        Self {
            state: Mutex::new(BreakerState {
                phase: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at_millis: 0,
            }),
            config,
            clock: Arc::new(MonotonicClock::default()),
            metrics,
        }
    }

    /// Override the clock (deterministic tests).
    pub fn with_clock<C: Clock + 'static>(self, clock: C) -> Self {
        self.with_shared_clock(Arc::new(clock))
    }

    pub fn with_shared_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Check admission, performing the lazy open→half-open transition.
    ///
    /// Half-open admits every caller: concurrent probes are tolerated and
    /// the first completion settles the phase.
    pub fn admit(&self) -> Admission {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        match state.phase {
            CircuitState::Closed => {
                Admission { allowed: true, phase: CircuitState::Closed, open_for: Duration::ZERO }
            }
            CircuitState::HalfOpen => {
                Admission { allowed: true, phase: CircuitState::HalfOpen, open_for: Duration::ZERO }
            }
            CircuitState::Open => {
                let open_for = now.saturating_sub(state.opened_at_millis);
                if open_for >= self.config.recovery_timeout.as_millis() as u64 {
                    state.phase = CircuitState::HalfOpen;
                    self.metrics.set_breaker_state(CircuitState::HalfOpen.gauge_value());
                    tracing::info!("circuit breaker half-open, probing recovery");
                    Admission {
                        allowed: true,
                        phase: CircuitState::HalfOpen,
                        open_for: Duration::ZERO,
                    }
                } else {
                    Admission {
                        allowed: false,
                        phase: CircuitState::Open,
                        open_for: Duration::from_millis(open_for),
                    }
                }
            }
        }
    }

    pub fn on_success(&self) {
        let mut state = self.lock();
        state.consecutive_failures = 0;
        if state.phase != CircuitState::Closed {
            state.phase = CircuitState::Closed;
            state.opened_at_millis = 0;
            self.metrics.set_breaker_state(CircuitState::Closed.gauge_value());
            tracing::info!("circuit breaker closed");
        }
    }

    /// Record a failure. Replies with a 4xx code (429 included) are not
    /// qualifying and leave the breaker untouched.
    pub fn on_failure(&self, error_code: Option<i64>) {
        if !is_qualifying(error_code) {
            return;
        }
        let now = self.clock.now_millis();
        let mut state = self.lock();
        state.consecutive_failures = state.consecutive_failures.saturating_add(1);
        match state.phase {
            CircuitState::HalfOpen => self.trip(&mut state, now),
            CircuitState::Closed => {
                if state.consecutive_failures >= self.config.failure_threshold {
                    self.trip(&mut state, now);
                }
            }
            CircuitState::Open => {}
        }
    }

    pub fn phase(&self) -> CircuitState {
        self.lock().phase
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.lock().consecutive_failures
    }

    fn trip(&self, state: &mut BreakerState, now: u64) {
        state.phase = CircuitState::Open;
        state.opened_at_millis = now;
        self.metrics.set_breaker_state(CircuitState::Open.gauge_value());
        self.metrics.record_breaker_trip();
        tracing::warn!(
            failures = state.consecutive_failures,
            threshold = self.config.failure_threshold,
            "circuit breaker open"
        );
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Transport errors and upstream 5xx count toward the threshold.
fn is_qualifying(error_code: Option<i64>) -> bool {
    match error_code {
        None => true,
        Some(code) => code >= 500,
    }
}
