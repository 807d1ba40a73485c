//! Reply envelope shared by every invocation, plus failure classification.
//!
//! The envelope mirrors the platform's wire shape (`ok`, `result`,
//! `description`, `error_code`, `parameters`) so upstream replies pass
//! through unchanged and synthesized failures look identical to callers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Extra failure metadata the platform may attach to a reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplyParameters {
    /// Seconds the caller should wait before retrying (rate limits).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

/// Canonical reply envelope for every invocation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApiReply {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<ReplyParameters>,
}

impl ApiReply {
    pub fn success(result: Value) -> Self {
        Self { ok: true, result: Some(result), ..Self::default() }
    }

    pub fn failure(error_code: i64, description: impl Into<String>) -> Self {
        Self {
            ok: false,
            description: Some(description.into()),
            error_code: Some(error_code),
            ..Self::default()
        }
    }

    /// Failure with no error code: transport-level problems (network,
    /// timeout) where no upstream reply was decoded.
    pub fn transport_failure(description: impl Into<String>) -> Self {
        Self { ok: false, description: Some(description.into()), ..Self::default() }
    }

    /// Validation short-circuit. Carries no error code: the call never
    /// reached the wire, so HTTP semantics do not apply.
    pub fn validation_failure(details: impl Into<String>) -> Self {
        Self {
            ok: false,
            description: Some(format!("Validation failed: {}", details.into())),
            ..Self::default()
        }
    }

    pub fn circuit_open(open_for_millis: u64) -> Self {
        Self::failure(
            503,
            format!(
                "Service unavailable: circuit breaker open for {:.1}s",
                open_for_millis as f64 / 1000.0
            ),
        )
    }

    pub fn rate_limited(description: impl Into<String>, retry_after_secs: u64) -> Self {
        Self {
            ok: false,
            description: Some(description.into()),
            error_code: Some(429),
            parameters: Some(ReplyParameters { retry_after: Some(retry_after_secs) }),
            ..Self::default()
        }
    }

    /// Generic envelope for internal programmer errors caught at the
    /// top-level handler. Never leaks details.
    pub fn internal_error() -> Self {
        Self::failure(500, "Internal error")
    }

    pub fn retry_after(&self) -> Option<u64> {
        self.parameters.as_ref().and_then(|p| p.retry_after)
    }
}

/// Mutually exclusive failure categories attached to every non-success
/// outcome, used as a metrics label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Client,
    Server,
    Network,
    RateLimited,
    Timeout,
    CircuitOpen,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION",
            Self::Client => "CLIENT",
            Self::Server => "SERVER",
            Self::Network => "NETWORK",
            Self::RateLimited => "RATE_LIMITED",
            Self::Timeout => "TIMEOUT",
            Self::CircuitOpen => "CIRCUIT_OPEN",
        }
    }

    /// Classify a failed reply. First match wins.
    pub fn classify(reply: &ApiReply) -> Self {
        let description = reply.description.as_deref().unwrap_or("").to_ascii_lowercase();
        if description.contains("timeout") || description.contains("timed out") {
            return Self::Timeout;
        }
        if description.contains("circuit breaker") {
            return Self::CircuitOpen;
        }
        match reply.error_code {
            None => Self::Network,
            Some(429) => Self::RateLimited,
            Some(code) if code >= 500 => Self::Server,
            _ => Self::Client,
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
