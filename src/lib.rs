#![forbid(unsafe_code)]

//! # botgate
//!
//! A resilient gateway between tool-protocol clients and a bot platform's
//! HTTP+JSON method surface. Clients select a method by name and supply a
//! JSON parameter object; the gateway validates, caches, rate-limits,
//! circuit-breaks, encodes uploads, retries, and dispatches the call,
//! returning the platform's reply unchanged on success or a structured
//! error envelope on failure.
//!
//! ## Architecture
//!
//! The [`pipeline::Pipeline`] is the heart: it owns the response cache,
//! the global and per-destination rate limiters, the circuit breaker, the
//! metrics registry, and the outbound transport, and drives every
//! invocation through them in a fixed order. Everything else is an
//! adapter:
//!
//! - [`methods`]: the immutable descriptor table driving validation,
//!   caching, pacing, and upload encoding without per-method code.
//! - [`tool`]: the client-facing tool surface (flat and meta shapes) over
//!   newline-framed stdio and HTTP.
//! - [`webhook`]: the inbound update receiver with its bounded queue.
//! - [`admin`]: health, readiness, liveness, and Prometheus endpoints.
//!
//! Every guard takes an injected [`clock::Clock`] and retry waits go
//! through a [`sleeper::Sleeper`], so tests run deterministically without
//! real time.

pub mod admin;
pub mod cache;
pub mod circuit_breaker;
pub mod clock;
pub mod config;
pub mod envelope;
pub mod error;
pub mod health;
pub mod http;
pub mod logging;
pub mod metrics;
pub mod methods;
pub mod pipeline;
pub mod rate_limit;
pub mod retry;
pub mod sleeper;
pub mod tool;
pub mod upload;
pub mod validator;
pub mod webhook;

pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{Config, ToolMode};
pub use envelope::{ApiReply, ErrorCategory};
pub use error::GatewayError;
pub use health::HealthAggregator;
pub use http::{ApiTransport, HttpTransport, ScriptedTransport};
pub use metrics::Metrics;
pub use pipeline::{InvokeOptions, Pipeline, PipelineSettings};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
