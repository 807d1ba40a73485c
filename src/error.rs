//! Startup-time error type.
//!
//! Runtime failures never use this: the pipeline reports everything as a
//! reply envelope. This covers the things that can go wrong before the
//! gateway is serving at all.

use crate::config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("metrics registry error: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
