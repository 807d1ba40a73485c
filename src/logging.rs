//! Structured stderr logging and value redaction.
//!
//! Everything the gateway logs flows through `tracing`; anything that
//! might embed user-supplied or configured values is passed through
//! [`redact`] first. Redaction drops values under sensitive keys, then
//! re-scans every remaining string for bot-token shapes, so a token
//! smuggled inside an innocent field still never reaches stderr.

use crate::config::Config;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

/// Key fragments whose values are always dropped, matched
/// case-insensitively as substrings.
const SENSITIVE_KEYS: &[&str] = &[
    "token",
    "password",
    "secret",
    "apikey",
    "authorization",
    "credentials",
    "bottoken",
    "providertoken",
    "webhooksecret",
];

pub const REDACTED: &str = "[REDACTED]";
pub const DEPTH_SENTINEL: &str = "[MAX_DEPTH_EXCEEDED]";
const MAX_DEPTH: usize = 10;

/// Install the process-wide subscriber. `RUST_LOG` wins when set.
pub fn init(config: &Config) {
    let default_filter =
        if config.debug { "debug" } else { config.log_level.as_filter() };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEYS.iter().any(|fragment| lower.contains(fragment))
}

/// Redact a JSON value for logging.
pub fn redact(value: &Value) -> Value {
    redact_at(value, 0)
}

fn redact_at(value: &Value, depth: usize) -> Value {
    if depth > MAX_DEPTH {
        return Value::String(DEPTH_SENTINEL.to_string());
    }
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, inner) in map {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(REDACTED.to_string()));
                } else {
                    out.insert(key.clone(), redact_at(inner, depth + 1));
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| redact_at(item, depth + 1)).collect())
        }
        Value::String(s) => Value::String(mask_token_shapes(s)),
        other => other.clone(),
    }
}

/// Replace `<digits>:<long token tail>` shapes inside a string. The tail
/// threshold keeps ordinary `key:value` strings intact.
fn mask_token_shapes(input: &str) -> String {
    const MIN_TAIL: usize = 25;
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i].is_ascii_digit() {
            let digits_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i < bytes.len() && bytes[i] == b':' {
                let tail_start = i + 1;
                let mut j = tail_start;
                while j < bytes.len()
                    && (bytes[j].is_ascii_alphanumeric() || bytes[j] == b'_' || bytes[j] == b'-')
                {
                    j += 1;
                }
                if j - tail_start >= MIN_TAIL {
                    out.push_str(REDACTED);
                    i = j;
                    continue;
                }
            }
            out.push_str(&input[digits_start..i]);
        } else {
            // Safe: we advance one full UTF-8 character.
            let ch = input[i..].chars().next().expect("in-bounds char");
            out.push(ch);
            i += ch.len_utf8();
        }
    }
    out
}
