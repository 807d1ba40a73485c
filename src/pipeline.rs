//! The request pipeline: validation, cache, breaker, limiters, upload
//! encoding, retries, and dispatch, in that order.
//!
//! One `Pipeline` value owns its guards and is shared across transports;
//! every shared structure serialises behind its own lock and no lock is
//! held across a wire exchange. All failures come back as envelopes, never
//! as errors.

use crate::cache::ResponseCache;
use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::clock::{Clock, MonotonicClock};
use crate::envelope::{ApiReply, ErrorCategory};
use crate::http::{ApiTransport, WireCall};
use crate::metrics::Metrics;
use crate::methods::{registry, MethodRegistry};
use crate::rate_limit::{GlobalRateLimiter, PerChatRateLimiter};
use crate::retry::RetryPolicy;
use crate::sleeper::{Sleeper, TokioSleeper};
use crate::upload;
use crate::validator::validate;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Per-call HTTP timeout bounds.
pub const MIN_TIMEOUT: Duration = Duration::from_secs(5);
pub const MAX_TIMEOUT: Duration = Duration::from_secs(120);
/// Retry budget ceiling.
pub const MAX_RETRY_BUDGET: u32 = 10;

/// Runtime knobs, typically filled from [`crate::config::Config`].
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub rate_limit_per_minute: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            max_retries: 3,
            rate_limit_per_minute: 30,
        }
    }
}

/// Per-invocation overrides.
#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Health probes bypass the global budget.
    pub skip_global_limit: bool,
    pub timeout: Option<Duration>,
    pub max_retries: Option<u32>,
}

pub struct PipelineBuilder {
    transport: Arc<dyn ApiTransport>,
    settings: PipelineSettings,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
    metrics: Option<Arc<Metrics>>,
}

impl PipelineBuilder {
    pub fn settings(mut self, settings: PipelineSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Override the clock feeding every time-based guard (tests).
    pub fn clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Override the retry sleeper (tests).
    pub fn sleeper<S: Sleeper + 'static>(mut self, sleeper: S) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn build(self) -> Result<Pipeline, prometheus::Error> {
        let metrics = match self.metrics {
            Some(m) => m,
            None => Arc::new(Metrics::new()?),
        };
        Ok(Pipeline {
            registry: registry(),
            cache: Arc::new(ResponseCache::new(self.clock.clone())),
            global: Arc::new(GlobalRateLimiter::new(
                self.settings.rate_limit_per_minute.clamp(1, 60),
                self.clock.clone(),
            )),
            per_chat: Arc::new(PerChatRateLimiter::new(self.clock.clone())),
            breaker: Arc::new(
                CircuitBreaker::with_config(CircuitBreakerConfig::default(), metrics.clone())
                    .with_shared_clock(self.clock),
            ),
            metrics,
            transport: self.transport,
            sleeper: self.sleeper,
            settings: self.settings,
        })
    }
}

/// The pipeline driver. Cheap to share: every field is an `Arc`.
pub struct Pipeline {
    registry: &'static MethodRegistry,
    cache: Arc<ResponseCache>,
    global: Arc<GlobalRateLimiter>,
    per_chat: Arc<PerChatRateLimiter>,
    breaker: Arc<CircuitBreaker>,
    metrics: Arc<Metrics>,
    transport: Arc<dyn ApiTransport>,
    sleeper: Arc<dyn Sleeper>,
    settings: PipelineSettings,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("settings", &self.settings).finish_non_exhaustive()
    }
}

impl Pipeline {
    pub fn builder(transport: Arc<dyn ApiTransport>) -> PipelineBuilder {
        PipelineBuilder {
            transport,
            settings: PipelineSettings::default(),
            clock: Arc::new(MonotonicClock::default()),
            sleeper: Arc::new(TokioSleeper),
            metrics: None,
        }
    }

    /// Drive one invocation through every stage and return its envelope.
    pub async fn invoke(&self, method: &str, params: Value, options: InvokeOptions) -> ApiReply {
        let started = Instant::now();
        let descriptor = self.registry.get(method);

        let params = match validate(descriptor, &params) {
            Ok(normalised) => normalised,
            Err(error) => {
                let reply = ApiReply::validation_failure(error.to_string());
                return self.finish(method, started, reply, Some(ErrorCategory::Validation));
            }
        };

        let cache_ttl = descriptor.and_then(|d| d.cache_ttl);
        if cache_ttl.is_some() {
            if let Some(cached) = self.cache.lookup(method, &params) {
                self.metrics.record_cache_hit(method);
                self.metrics.record_request(method, true, started.elapsed());
                tracing::debug!(method, "cache hit");
                return ApiReply::success(cached);
            }
            self.metrics.record_cache_miss(method);
        }

        let admission = self.breaker.admit();
        if !admission.allowed {
            let reply = ApiReply::circuit_open(admission.open_for.as_millis() as u64);
            return self.finish(method, started, reply, Some(ErrorCategory::CircuitOpen));
        }

        if !options.skip_global_limit {
            let decision = self.global.admit();
            if !decision.is_allowed() {
                self.metrics.record_rate_limit_hit("global");
                let wait_secs = decision.wait_millis().div_ceil(1000);
                let reply = ApiReply::rate_limited(
                    format!("Rate limit exceeded. Wait {wait_secs} seconds."),
                    wait_secs,
                );
                return self.finish(method, started, reply, Some(ErrorCategory::RateLimited));
            }
        }

        let destination = descriptor
            .filter(|d| d.destination_scoped)
            .and_then(|_| destination_id(&params));
        if let Some(dest) = &destination {
            let decision = self.per_chat.admit_for(dest);
            if !decision.is_allowed() {
                self.metrics.record_rate_limit_hit("per_chat");
                let wait_secs = decision.wait_millis().div_ceil(1000);
                let reply = ApiReply::rate_limited(
                    format!("Per-chat rate limit exceeded. Wait {wait_secs} seconds."),
                    wait_secs,
                );
                return self.finish(method, started, reply, Some(ErrorCategory::RateLimited));
            }
        }

        let body = match upload::prepare(descriptor, &params).await {
            Ok(body) => body,
            Err(error) => {
                let reply = ApiReply::failure(400, error.to_string());
                return self.finish(method, started, reply, Some(ErrorCategory::Client));
            }
        };

        let timeout = options
            .timeout
            .unwrap_or(self.settings.request_timeout)
            .clamp(MIN_TIMEOUT, MAX_TIMEOUT);
        let max_retries =
            options.max_retries.unwrap_or(self.settings.max_retries).min(MAX_RETRY_BUDGET);
        let retrier =
            RetryPolicy::new(max_retries, self.sleeper.clone(), self.metrics.clone());

        let transport = self.transport.clone();
        let global = self.global.clone();
        let skip_global = options.skip_global_limit;
        let body_ref = &body;
        let outcome = retrier
            .execute(move || {
                let transport = transport.clone();
                let global = global.clone();
                async move {
                    // Retries consume budget too.
                    if !skip_global {
                        global.record();
                    }
                    transport.execute(WireCall { method, body: body_ref, timeout }).await
                }
            })
            .await;

        match outcome {
            Ok(reply) if reply.ok => {
                self.breaker.on_success();
                if let Some(ttl) = cache_ttl {
                    self.cache.store(
                        method,
                        &params,
                        reply.result.clone().unwrap_or(Value::Null),
                        Some(ttl),
                    );
                    self.metrics.set_cache_size(self.cache.stats().size);
                }
                if let Some(dest) = &destination {
                    self.per_chat.record_for(dest);
                }
                self.finish(method, started, reply, None)
            }
            Ok(reply) => {
                self.breaker.on_failure(reply.error_code);
                let category = ErrorCategory::classify(&reply);
                self.finish(method, started, reply, Some(category))
            }
            Err(error) => {
                self.breaker.on_failure(None);
                let reply = ApiReply::transport_failure(error.to_string());
                let category = ErrorCategory::classify(&reply);
                self.finish(method, started, reply, Some(category))
            }
        }
    }

    fn finish(
        &self,
        method: &str,
        started: Instant,
        reply: ApiReply,
        category: Option<ErrorCategory>,
    ) -> ApiReply {
        let elapsed = started.elapsed();
        match category {
            None => {
                self.metrics.record_request(method, true, elapsed);
                tracing::info!(method, elapsed_ms = elapsed.as_millis() as u64, "invocation ok");
            }
            Some(category) => {
                self.metrics.record_error(method, category.as_str());
                self.metrics.record_request(method, false, elapsed);
                tracing::info!(
                    method,
                    category = category.as_str(),
                    elapsed_ms = elapsed.as_millis() as u64,
                    "invocation failed"
                );
            }
        }
        reply
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn global_limiter(&self) -> &Arc<GlobalRateLimiter> {
        &self.global
    }

    pub fn per_chat_limiter(&self) -> &Arc<PerChatRateLimiter> {
        &self.per_chat
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}

/// Destination id for per-chat pacing: the `chat_id` parameter, when the
/// invocation carries one.
fn destination_id(params: &Value) -> Option<String> {
    match params.get("chat_id")? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::http::ScriptedTransport;
    use crate::sleeper::InstantSleeper;
    use serde_json::json;

    fn pipeline(transport: ScriptedTransport) -> Pipeline {
        Pipeline::builder(Arc::new(transport))
            .clock(ManualClock::new())
            .sleeper(InstantSleeper)
            .build()
            .expect("pipeline builds")
    }

    #[tokio::test]
    async fn validation_failure_short_circuits_before_any_stage() {
        let transport = ScriptedTransport::always_ok();
        let pipeline = pipeline(transport.clone());

        let reply = pipeline
            .invoke("send_text", json!({"chat_id": 1}), InvokeOptions::default())
            .await;

        assert!(!reply.ok);
        assert!(reply.description.unwrap().starts_with("Validation failed:"));
        assert_eq!(reply.error_code, None);
        assert_eq!(transport.call_count(), 0);
        assert_eq!(pipeline.global_limiter().in_window(), 0, "no budget consumed");
    }

    #[tokio::test]
    async fn success_records_budget_and_closes_loop() {
        let transport = ScriptedTransport::always_ok();
        let pipeline = pipeline(transport.clone());

        let reply = pipeline
            .invoke("send_text", json!({"chat_id": 77, "text": "hi"}), InvokeOptions::default())
            .await;

        assert!(reply.ok);
        assert_eq!(transport.call_count(), 1);
        assert_eq!(pipeline.global_limiter().in_window(), 1);
        assert_eq!(pipeline.per_chat_limiter().tracked(), 1);
    }

    #[tokio::test]
    async fn unknown_method_passes_through_to_the_wire() {
        let transport = ScriptedTransport::always_ok();
        let pipeline = pipeline(transport.clone());

        let reply = pipeline
            .invoke("brand_new_method", json!({"anything": 1}), InvokeOptions::default())
            .await;

        assert!(reply.ok);
        assert_eq!(transport.calls()[0].method, "brand_new_method");
    }

    #[tokio::test]
    async fn skip_global_limit_consumes_no_budget() {
        let transport = ScriptedTransport::always_ok();
        let pipeline = pipeline(transport.clone());

        let options = InvokeOptions { skip_global_limit: true, ..Default::default() };
        let reply = pipeline.invoke("get_identity", json!({}), options).await;

        assert!(reply.ok);
        assert_eq!(pipeline.global_limiter().in_window(), 0);
    }

    #[tokio::test]
    async fn global_refusal_carries_retry_after() {
        let transport = ScriptedTransport::always_ok();
        let pipeline = Pipeline::builder(Arc::new(transport.clone()))
            .clock(ManualClock::new())
            .sleeper(InstantSleeper)
            .settings(PipelineSettings { rate_limit_per_minute: 1, ..Default::default() })
            .build()
            .unwrap();

        let ok = pipeline
            .invoke("send_chat_action", json!({"chat_id": 1, "action": "typing"}), InvokeOptions::default())
            .await;
        assert!(ok.ok);

        let refused = pipeline
            .invoke("send_chat_action", json!({"chat_id": 1, "action": "typing"}), InvokeOptions::default())
            .await;
        assert_eq!(refused.error_code, Some(429));
        assert!(refused.description.as_deref().unwrap().starts_with("Rate limit exceeded."));
        assert_eq!(refused.retry_after(), Some(60));
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test]
    async fn upload_failure_maps_to_client_error() {
        let transport = ScriptedTransport::always_ok();
        let pipeline = pipeline(transport.clone());

        let reply = pipeline
            .invoke(
                "send_photo",
                json!({"chat_id": 1, "photo": "file:///definitely/missing.png"}),
                InvokeOptions::default(),
            )
            .await;

        assert_eq!(reply.error_code, Some(400));
        assert!(reply.description.unwrap().contains("/definitely/missing.png"));
        assert_eq!(transport.call_count(), 0);
    }

    #[tokio::test]
    async fn upstream_envelope_is_propagated_unchanged() {
        let transport = ScriptedTransport::always_ok();
        transport.push(Ok(ApiReply::failure(403, "Forbidden: bot was blocked by the user")));
        let pipeline = pipeline(transport.clone());

        let reply = pipeline
            .invoke("send_text", json!({"chat_id": 5, "text": "x"}), InvokeOptions::default())
            .await;

        assert_eq!(reply.error_code, Some(403));
        assert_eq!(reply.description.as_deref(), Some("Forbidden: bot was blocked by the user"));
        assert_eq!(pipeline.breaker().consecutive_failures(), 0, "4xx is not qualifying");
    }
}
