//! Prometheus metrics for the request pipeline.
//!
//! One registry per gateway instance; tests construct their own so
//! assertions never race. Text exposition comes from the prometheus
//! encoder and is served by the admin listener.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;

/// Circuit breaker phase values for the state gauge.
pub const BREAKER_GAUGE_CLOSED: i64 = 0;
pub const BREAKER_GAUGE_OPEN: i64 = 1;
pub const BREAKER_GAUGE_HALF_OPEN: i64 = 2;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    requests: IntCounterVec,
    duration: HistogramVec,
    errors: IntCounterVec,
    retries: IntCounterVec,
    rate_limit_hits: IntCounterVec,
    cache_hits: IntCounterVec,
    cache_misses: IntCounterVec,
    cache_size: IntGauge,
    breaker_state: IntGauge,
    breaker_trips: IntCounter,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create a registry and register every pipeline metric into it.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Arc::new(Registry::new());

        let requests = IntCounterVec::new(
            Opts::new("botgate_requests_total", "Completed invocations by method and status"),
            &["method", "status"],
        )?;
        let duration = HistogramVec::new(
            HistogramOpts::new("botgate_request_duration_seconds", "Invocation duration")
                .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
            &["method"],
        )?;
        let errors = IntCounterVec::new(
            Opts::new("botgate_errors_total", "Failed invocations by method and category"),
            &["method", "category"],
        )?;
        let retries = IntCounterVec::new(
            Opts::new("botgate_retries_total", "Retry attempts by reason"),
            &["reason"],
        )?;
        let rate_limit_hits = IntCounterVec::new(
            Opts::new("botgate_rate_limit_hits_total", "Admissions refused by a limiter"),
            &["type"],
        )?;
        let cache_hits = IntCounterVec::new(
            Opts::new("botgate_cache_hits_total", "Response cache hits by method"),
            &["method"],
        )?;
        let cache_misses = IntCounterVec::new(
            Opts::new("botgate_cache_misses_total", "Response cache misses by method"),
            &["method"],
        )?;
        let cache_size = IntGauge::new("botgate_cache_size", "Entries in the response cache")?;
        let breaker_state = IntGauge::new(
            "botgate_circuit_breaker_state",
            "Breaker phase: 0 closed, 1 open, 2 half-open",
        )?;
        let breaker_trips =
            IntCounter::new("botgate_circuit_breaker_trips_total", "Transitions to open")?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(duration.clone()))?;
        registry.register(Box::new(errors.clone()))?;
        registry.register(Box::new(retries.clone()))?;
        registry.register(Box::new(rate_limit_hits.clone()))?;
        registry.register(Box::new(cache_hits.clone()))?;
        registry.register(Box::new(cache_misses.clone()))?;
        registry.register(Box::new(cache_size.clone()))?;
        registry.register(Box::new(breaker_state.clone()))?;
        registry.register(Box::new(breaker_trips.clone()))?;

        Ok(Self {
            registry,
            requests,
            duration,
            errors,
            retries,
            rate_limit_hits,
            cache_hits,
            cache_misses,
            cache_size,
            breaker_state,
            breaker_trips,
        })
    }

    pub fn record_request(&self, method: &str, ok: bool, elapsed: Duration) {
        let status = if ok { "ok" } else { "error" };
        self.requests.with_label_values(&[method, status]).inc();
        self.duration.with_label_values(&[method]).observe(elapsed.as_secs_f64());
    }

    pub fn record_error(&self, method: &str, category: &str) {
        self.errors.with_label_values(&[method, category]).inc();
    }

    pub fn record_retry(&self, reason: &str) {
        self.retries.with_label_values(&[reason]).inc();
    }

    pub fn record_rate_limit_hit(&self, kind: &str) {
        self.rate_limit_hits.with_label_values(&[kind]).inc();
    }

    pub fn record_cache_hit(&self, method: &str) {
        self.cache_hits.with_label_values(&[method]).inc();
    }

    pub fn record_cache_miss(&self, method: &str) {
        self.cache_misses.with_label_values(&[method]).inc();
    }

    pub fn set_cache_size(&self, size: usize) {
        self.cache_size.set(size as i64);
    }

    pub fn set_breaker_state(&self, phase: i64) {
        self.breaker_state.set(phase);
    }

    pub fn record_breaker_trip(&self) {
        self.breaker_trips.inc();
    }

    pub fn breaker_trips(&self) -> u64 {
        self.breaker_trips.get()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> String {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(error) = encoder.encode(&families, &mut buf) {
            tracing::warn!(%error, "metrics encoding failed");
            return String::new();
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_exposes_counters_in_text_format() {
        let metrics = Metrics::new().expect("registry");
        metrics.record_request("get_identity", true, Duration::from_millis(120));
        metrics.record_retry("server_error");
        metrics.record_rate_limit_hit("global");

        let text = metrics.render();
        assert!(text.contains("botgate_requests_total"));
        assert!(text.contains("method=\"get_identity\""));
        assert!(text.contains("botgate_retries_total"));
        assert!(text.contains("reason=\"server_error\""));
        assert!(text.contains("botgate_rate_limit_hits_total"));
    }

    #[test]
    fn breaker_gauge_tracks_latest_phase() {
        let metrics = Metrics::new().expect("registry");
        metrics.set_breaker_state(BREAKER_GAUGE_OPEN);
        metrics.record_breaker_trip();
        metrics.set_breaker_state(BREAKER_GAUGE_CLOSED);

        assert_eq!(metrics.breaker_trips(), 1);
        let text = metrics.render();
        assert!(text.contains("botgate_circuit_breaker_state 0"));
    }
}
