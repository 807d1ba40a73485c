//! Rate limiting for outbound calls.
//!
//! Two disciplines guard the wire:
//! - [`GlobalRateLimiter`]: a sliding 60-second window over all calls.
//! - [`PerChatRateLimiter`]: per-destination pacing — private chats take at
//!   most one send per second, groups and channels at most 20 per minute.
//!
//! Both refuse rather than wait: callers receive a [`Decision`] with the
//! delay to advertise, and the pipeline turns refusals into 429 envelopes.

use crate::clock::{Clock, MonotonicClock};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Trailing window for both the global and the group budgets.
pub const WINDOW_MILLIS: u64 = 60_000;

/// Sends allowed per window for a group or channel destination.
pub const GROUP_BUDGET: usize = 20;

/// Minimum inter-arrival time for a private destination.
pub const PRIVATE_MIN_INTERVAL_MILLIS: u64 = 1_000;

/// The outcome of an admission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    /// Denied, with the minimum delay after which the call could be
    /// admitted.
    Denied { wait: Duration },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    pub fn wait_millis(&self) -> u64 {
        match self {
            Decision::Allowed => 0,
            Decision::Denied { wait } => wait.as_millis() as u64,
        }
    }
}

/// Sliding-window counter over every outbound call in the process.
///
/// `admit` and `record` are separate so the pipeline can re-record on each
/// retry attempt: retries consume budget too.
#[derive(Debug)]
pub struct GlobalRateLimiter {
    instants: Mutex<VecDeque<u64>>,
    budget: usize,
    clock: Arc<dyn Clock>,
}

impl GlobalRateLimiter {
    pub fn new(budget: usize, clock: Arc<dyn Clock>) -> Self {
        Self { instants: Mutex::new(VecDeque::new()), budget, clock }
    }

    pub fn with_budget(budget: usize) -> Self {
        Self::new(budget, Arc::new(MonotonicClock::default()))
    }

    pub fn admit(&self) -> Decision {
        let now = self.clock.now_millis();
        let mut instants = self.lock();
        evict_window(&mut instants, now);
        if instants.len() < self.budget {
            Decision::Allowed
        } else {
            let oldest = *instants.front().expect("window is non-empty at budget");
            let wait = WINDOW_MILLIS.saturating_sub(now.saturating_sub(oldest));
            Decision::Denied { wait: Duration::from_millis(wait) }
        }
    }

    pub fn record(&self) {
        let now = self.clock.now_millis();
        self.lock().push_back(now);
    }

    /// Calls currently inside the window, for health reporting.
    pub fn in_window(&self) -> usize {
        let now = self.clock.now_millis();
        let mut instants = self.lock();
        evict_window(&mut instants, now);
        instants.len()
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Whether the window is at or beyond budget right now.
    pub fn saturated(&self) -> bool {
        self.in_window() >= self.budget
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<u64>> {
        self.instants.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn evict_window(instants: &mut VecDeque<u64>, now: u64) {
    let cutoff = now.saturating_sub(WINDOW_MILLIS);
    while instants.front().is_some_and(|&t| t < cutoff) {
        instants.pop_front();
    }
}

/// Destination pacing regime, derived from the destination id.
///
/// Numeric ids below zero are groups/channels; zero and above are private
/// endpoints. Ids that fail integer parsing (e.g. `@channelname`) fall back
/// to the conservative group regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DestinationKind {
    Private,
    Group,
}

impl DestinationKind {
    pub fn classify(destination: &str) -> Self {
        match destination.parse::<i64>() {
            Ok(id) if id < 0 => Self::Group,
            Ok(_) => Self::Private,
            Err(_) => Self::Group,
        }
    }
}

#[derive(Debug, Default)]
struct PerChatState {
    histories: HashMap<String, VecDeque<u64>>,
    last_sweep: u64,
}

/// Per-destination send pacing with lazy sweeping of idle destinations.
#[derive(Debug)]
pub struct PerChatRateLimiter {
    state: Mutex<PerChatState>,
    clock: Arc<dyn Clock>,
}

impl Default for PerChatRateLimiter {
    fn default() -> Self {
        Self::new(Arc::new(MonotonicClock::default()))
    }
}

impl PerChatRateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { state: Mutex::new(PerChatState::default()), clock }
    }

    pub fn admit_for(&self, destination: &str) -> Decision {
        let now = self.clock.now_millis();
        let kind = DestinationKind::classify(destination);
        let mut state = self.lock();
        sweep_if_due(&mut state, now);

        let Some(history) = state.histories.get_mut(destination) else {
            return Decision::Allowed;
        };
        match kind {
            DestinationKind::Group => {
                evict_window(history, now);
                if history.len() < GROUP_BUDGET {
                    Decision::Allowed
                } else {
                    let oldest = *history.front().expect("window is non-empty at budget");
                    let wait = WINDOW_MILLIS.saturating_sub(now.saturating_sub(oldest));
                    Decision::Denied { wait: Duration::from_millis(wait) }
                }
            }
            DestinationKind::Private => match history.back() {
                Some(&last) if now.saturating_sub(last) < PRIVATE_MIN_INTERVAL_MILLIS => {
                    let wait = PRIVATE_MIN_INTERVAL_MILLIS - now.saturating_sub(last);
                    Decision::Denied { wait: Duration::from_millis(wait) }
                }
                _ => Decision::Allowed,
            },
        }
    }

    pub fn record_for(&self, destination: &str) {
        let now = self.clock.now_millis();
        let mut state = self.lock();
        sweep_if_due(&mut state, now);
        state.histories.entry(destination.to_string()).or_default().push_back(now);
    }

    /// Number of destinations currently tracked.
    pub fn tracked(&self) -> usize {
        self.lock().histories.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, PerChatState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Drop destinations whose history lies fully outside the window. Runs at
/// most once per window.
fn sweep_if_due(state: &mut PerChatState, now: u64) {
    if now.saturating_sub(state.last_sweep) < WINDOW_MILLIS {
        return;
    }
    state.last_sweep = now;
    let cutoff = now.saturating_sub(WINDOW_MILLIS);
    state.histories.retain(|_, history| history.back().is_some_and(|&t| t > cutoff));
}
