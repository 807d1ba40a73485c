//! Derived health status over the pipeline's shared guards.
//!
//! Nothing here is stored: every call reads the live breaker phase and
//! limiter occupancy and synthesises the overall verdict.

use crate::cache::ResponseCache;
use crate::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::rate_limit::{GlobalRateLimiter, PerChatRateLimiter};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub circuit_breaker: BreakerCheck,
    pub global_rate_limiter: LimiterCheck,
    pub per_chat_rate_limiter: PerChatCheck,
    pub cache: CacheCheck,
}

#[derive(Debug, Clone, Serialize)]
pub struct BreakerCheck {
    pub phase: &'static str,
    pub consecutive_failures: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LimiterCheck {
    pub in_window: usize,
    pub budget: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct PerChatCheck {
    pub tracked: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheCheck {
    pub size: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub overall: Overall,
    pub uptime_seconds: u64,
    pub timestamp: u64,
    pub checks: HealthChecks,
}

pub struct HealthAggregator {
    breaker: Arc<CircuitBreaker>,
    global: Arc<GlobalRateLimiter>,
    per_chat: Arc<PerChatRateLimiter>,
    cache: Arc<ResponseCache>,
    started: Instant,
}

impl HealthAggregator {
    pub fn new(
        breaker: Arc<CircuitBreaker>,
        global: Arc<GlobalRateLimiter>,
        per_chat: Arc<PerChatRateLimiter>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        Self { breaker, global, per_chat, cache, started: Instant::now() }
    }

    pub fn status(&self) -> HealthStatus {
        let phase = self.breaker.phase();
        let saturated = self.global.saturated();
        let overall = match phase {
            CircuitState::Open => Overall::Unhealthy,
            CircuitState::HalfOpen => Overall::Degraded,
            CircuitState::Closed if saturated => Overall::Degraded,
            CircuitState::Closed => Overall::Healthy,
        };
        HealthStatus {
            overall,
            uptime_seconds: self.started.elapsed().as_secs(),
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
            checks: HealthChecks {
                circuit_breaker: BreakerCheck {
                    phase: match phase {
                        CircuitState::Closed => "closed",
                        CircuitState::Open => "open",
                        CircuitState::HalfOpen => "half-open",
                    },
                    consecutive_failures: self.breaker.consecutive_failures(),
                },
                global_rate_limiter: LimiterCheck {
                    in_window: self.global.in_window(),
                    budget: self.global.budget(),
                },
                per_chat_rate_limiter: PerChatCheck { tracked: self.per_chat.tracked() },
                cache: CacheCheck { size: self.cache.stats().size },
            },
        }
    }

    /// Readiness: false only while the breaker is open.
    pub fn ready(&self) -> bool {
        self.breaker.phase() != CircuitState::Open
    }

    /// Liveness: the process can serve its configuration snapshot.
    pub fn live(&self) -> bool {
        true
    }
}
