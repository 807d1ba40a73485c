//! Per-method TTL response cache keyed by `(method, params)`.
//!
//! Keys use a canonical JSON form (object keys sorted at every level) so
//! logically equal parameter sets collide regardless of field order.
//! Expired entries are evicted eagerly on lookup.

use crate::clock::{Clock, MonotonicClock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    expires_at_millis: u64,
}

/// Aggregate cache statistics for health checks and debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub size: usize,
    pub by_method: HashMap<String, usize>,
}

/// Process-local response cache. Linearisable: one mutex guards the map so
/// lookup/store pairs execute atomically.
#[derive(Debug)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(Arc::new(MonotonicClock::default()))
    }
}

impl ResponseCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { entries: Mutex::new(HashMap::new()), clock }
    }

    /// Look up a cached reply. Observing an expired entry evicts it and
    /// reports a miss.
    pub fn lookup(&self, method: &str, params: &Value) -> Option<Value> {
        let key = cache_key(method, params);
        let now = self.clock.now_millis();
        let mut entries = self.lock();
        let live = match entries.get(&key) {
            None => return None,
            Some(entry) if now < entry.expires_at_millis => Some(entry.value.clone()),
            Some(_) => None,
        };
        if live.is_none() {
            entries.remove(&key);
        }
        live
    }

    /// Store a reply. A `None` TTL means the method is not cacheable and
    /// the store is ignored.
    pub fn store(&self, method: &str, params: &Value, value: Value, ttl: Option<Duration>) {
        let Some(ttl) = ttl else { return };
        let key = cache_key(method, params);
        let expires_at_millis = self.clock.now_millis().saturating_add(ttl.as_millis() as u64);
        self.lock().insert(key, CacheEntry { value, expires_at_millis });
    }

    /// Drop every entry of one method, leaving other methods untouched.
    pub fn evict_method(&self, method: &str) {
        let prefix = format!("{method}:");
        self.lock().retain(|key, _| !key.starts_with(&prefix));
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        let mut by_method: HashMap<String, usize> = HashMap::new();
        for key in entries.keys() {
            let method = key.split_once(':').map(|(m, _)| m).unwrap_or(key.as_str());
            *by_method.entry(method.to_string()).or_insert(0) += 1;
        }
        CacheStats { size: entries.len(), by_method }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn cache_key(method: &str, params: &Value) -> String {
    format!("{method}:{}", canonical_json(params))
}

/// Deterministic serialisation: object keys sorted at every nesting level,
/// arrays kept in order.
pub fn canonical_json(value: &Value) -> String {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let fields: Vec<String> = keys
                .into_iter()
                .map(|k| {
                    format!(
                        "{}:{}",
                        serde_json::to_string(k).expect("string serialises"),
                        canonical_json(&map[k])
                    )
                })
                .collect();
            format!("{{{}}}", fields.join(","))
        }
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(canonical_json).collect();
            format!("[{}]", parts.join(","))
        }
        other => serde_json::to_string(other).expect("scalar serialises"),
    }
}
