//! Outbound transport to the upstream platform.
//!
//! The pipeline talks to a trait so tests can script replies; production
//! uses a reqwest client POSTing to `{base_url}/bot{token}/{method}`.
//! The token lives only inside the request URL and is stripped from every
//! error before it can reach a log line.

use crate::envelope::ApiReply;
use crate::upload::EncodedBody;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// One wire attempt. Retries reuse the same call value.
#[derive(Debug, Clone, Copy)]
pub struct WireCall<'a> {
    pub method: &'a str,
    pub body: &'a EncodedBody,
    pub timeout: Duration,
}

/// Transport-level failure: no decoded upstream envelope exists.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request timeout after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid reply: {0}")]
    Decode(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[async_trait]
pub trait ApiTransport: Send + Sync + std::fmt::Debug {
    async fn execute(&self, call: WireCall<'_>) -> Result<ApiReply, TransportError>;
}

/// Production transport over HTTPS.
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Token deliberately absent.
        f.debug_struct("HttpTransport").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn execute(&self, call: WireCall<'_>) -> Result<ApiReply, TransportError> {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, call.method);
        let response = self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, call.body.content_type.as_str())
            .body(call.body.bytes.clone())
            .timeout(call.timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(call.timeout)
                } else {
                    // without_url: the URL embeds the bot token.
                    TransportError::Network(e.without_url().to_string())
                }
            })?;

        response.json::<ApiReply>().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout(call.timeout)
            } else {
                TransportError::Decode(e.without_url().to_string())
            }
        })
    }
}

/// A call as seen by the scripted transport, for test assertions.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: String,
    pub content_type: String,
}

/// Scripted transport for tests: pops pre-arranged outcomes in order and
/// falls back to a fixed outcome once the script is exhausted.
#[derive(Debug, Clone)]
pub struct ScriptedTransport {
    script: Arc<Mutex<VecDeque<Result<ApiReply, TransportError>>>>,
    calls: Arc<Mutex<Vec<RecordedCall>>>,
    fallback: Result<ApiReply, TransportError>,
}

impl ScriptedTransport {
    /// Empty script; every call succeeds with an empty result.
    pub fn always_ok() -> Self {
        Self {
            script: Arc::new(Mutex::new(VecDeque::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            fallback: Ok(ApiReply::success(serde_json::json!({}))),
        }
    }

    /// Empty script; every call fails the given way.
    pub fn always_err(error: TransportError) -> Self {
        Self { fallback: Err(error), ..Self::always_ok() }
    }

    /// Queue the next outcome. Outcomes are consumed in push order.
    pub fn push(&self, outcome: Result<ApiReply, TransportError>) -> &Self {
        self.script.lock().unwrap_or_else(|p| p.into_inner()).push_back(outcome);
        self
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).len()
    }
}

#[async_trait]
impl ApiTransport for ScriptedTransport {
    async fn execute(&self, call: WireCall<'_>) -> Result<ApiReply, TransportError> {
        self.calls.lock().unwrap_or_else(|p| p.into_inner()).push(RecordedCall {
            method: call.method.to_string(),
            content_type: call.body.content_type.clone(),
        });
        self.script
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}
