//! Process configuration from the environment.
//!
//! Loaded once, validated, clamped, and cached for the process lifetime.
//! `log_safe` produces the only view that may reach a log line: the token
//! collapses to its first and last four characters, secrets disappear,
//! and URLs keep scheme and host only.

use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use thiserror::Error;

pub const ENV_BOT_TOKEN: &str = "GATEWAY_BOT_TOKEN";
pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{ENV_BOT_TOKEN} is required")]
    MissingToken,
    #[error("{ENV_BOT_TOKEN} must look like <digits>:<secret>")]
    InvalidToken,
    #[error("{key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Notice,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "notice" => Some(Self::Notice),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }

    /// Closest tracing filter directive.
    pub fn as_filter(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info | Self::Notice => "info",
            Self::Warning => "warn",
            Self::Error | Self::Critical => "error",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Notice => "notice",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

/// Which tool surface the process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolMode {
    /// One tool per platform method.
    Flat,
    /// Two tools: `find` and `call`.
    #[default]
    Meta,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bot_token: String,
    pub api_base_url: String,
    pub log_level: LogLevel,
    pub request_timeout: Duration,
    pub max_retries: u32,
    pub rate_limit_per_minute: usize,
    pub webhook_url: Option<String>,
    pub webhook_secret: Option<String>,
    pub webhook_port: Option<u16>,
    pub health_port: Option<u16>,
    pub tool_mode: ToolMode,
    pub tool_http_port: Option<u16>,
    pub tool_auth_token: Option<String>,
    pub debug: bool,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source (tests).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bot_token = lookup(ENV_BOT_TOKEN).ok_or(ConfigError::MissingToken)?;
        if !token_is_valid(&bot_token) {
            return Err(ConfigError::InvalidToken);
        }

        let log_level = match lookup("LOG_LEVEL") {
            None => LogLevel::Info,
            Some(raw) => LogLevel::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                key: "LOG_LEVEL",
                reason: format!("unknown level {raw:?}"),
            })?,
        };

        let request_timeout = Duration::from_millis(
            parse_clamped(&lookup, "REQUEST_TIMEOUT", 30_000, 5_000, 120_000)?,
        );
        let max_retries = parse_clamped(&lookup, "MAX_RETRIES", 3, 0, 10)? as u32;
        let rate_limit_per_minute =
            parse_clamped(&lookup, "RATE_LIMIT_PER_MINUTE", 30, 1, 60)? as usize;

        let tool_mode = match lookup("TOOL_MODE").as_deref() {
            None => ToolMode::default(),
            Some("flat") => ToolMode::Flat,
            Some("meta") => ToolMode::Meta,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "TOOL_MODE",
                    reason: format!("expected flat or meta, got {other:?}"),
                })
            }
        };

        Ok(Self {
            bot_token,
            api_base_url: lookup("GATEWAY_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            log_level,
            request_timeout,
            max_retries,
            rate_limit_per_minute,
            webhook_url: lookup("WEBHOOK_URL"),
            webhook_secret: lookup("WEBHOOK_SECRET"),
            webhook_port: parse_port(&lookup, "WEBHOOK_PORT")?,
            health_port: parse_port(&lookup, "HEALTH_PORT")?,
            tool_mode,
            tool_http_port: parse_port(&lookup, "TOOL_HTTP_PORT")?,
            tool_auth_token: lookup("TOOL_AUTH_TOKEN"),
            debug: lookup("DEBUG").is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true")),
        })
    }

    /// Load once and cache for the process. Subsequent calls return the
    /// cached value regardless of environment changes.
    pub fn load_global() -> Result<Arc<Config>, ConfigError> {
        static CACHED: OnceLock<Arc<Config>> = OnceLock::new();
        if let Some(config) = CACHED.get() {
            return Ok(config.clone());
        }
        let config = Arc::new(Self::from_env()?);
        Ok(CACHED.get_or_init(|| config).clone())
    }

    /// Masked view safe for logging.
    pub fn log_safe(&self) -> Value {
        json!({
            "bot_token": mask_token(&self.bot_token),
            "api_base_url": mask_url(&self.api_base_url),
            "log_level": self.log_level.as_str(),
            "request_timeout_ms": self.request_timeout.as_millis() as u64,
            "max_retries": self.max_retries,
            "rate_limit_per_minute": self.rate_limit_per_minute,
            "webhook_url": self.webhook_url.as_deref().map(mask_url),
            "webhook_secret": self.webhook_secret.as_deref().map(|_| "[REDACTED]"),
            "webhook_port": self.webhook_port,
            "health_port": self.health_port,
            "tool_mode": match self.tool_mode { ToolMode::Flat => "flat", ToolMode::Meta => "meta" },
            "tool_http_port": self.tool_http_port,
            "tool_auth_token": self.tool_auth_token.as_deref().map(|_| "[REDACTED]"),
            "debug": self.debug,
        })
    }
}

fn token_is_valid(token: &str) -> bool {
    let Some((id, secret)) = token.split_once(':') else { return false };
    !id.is_empty()
        && id.chars().all(|c| c.is_ascii_digit())
        && !secret.is_empty()
        && secret.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn parse_clamped(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u64>()
            .map(|n| n.clamp(min, max))
            .map_err(|_| ConfigError::Invalid { key, reason: format!("not a number: {raw:?}") }),
    }
}

fn parse_port(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u16>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .parse::<u16>()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, reason: format!("not a port: {raw:?}") }),
    }
}

fn mask_token(token: &str) -> String {
    if token.len() <= 8 {
        return "[REDACTED]".to_string();
    }
    format!("{}…{}", &token[..4], &token[token.len() - 4..])
}

fn mask_url(url: &str) -> String {
    match url.split_once("://") {
        Some((scheme, rest)) => {
            let host = rest.split('/').next().unwrap_or(rest);
            format!("{scheme}://{host}/***")
        }
        None => "***".to_string(),
    }
}
