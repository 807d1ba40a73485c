//! Gateway entry point.
//!
//! Loads configuration from the environment, wires the pipeline, spawns
//! the optional listeners, and serves the tool protocol on stdio until
//! stdin closes or a shutdown signal arrives.

use botgate::config::Config;
use botgate::health::HealthAggregator;
use botgate::http::HttpTransport;
use botgate::pipeline::{InvokeOptions, Pipeline, PipelineSettings};
use botgate::tool::ToolSurface;
use botgate::webhook::UpdateQueue;
use botgate::{admin, logging, tool, webhook, GatewayError};
use serde_json::json;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    let config = Config::load_global()?;
    logging::init(&config);
    tracing::info!(config = %config.log_safe(), "starting botgate");

    let transport =
        Arc::new(HttpTransport::new(&config.api_base_url, &config.bot_token));
    let pipeline = Arc::new(
        Pipeline::builder(transport)
            .settings(PipelineSettings {
                request_timeout: config.request_timeout,
                max_retries: config.max_retries,
                rate_limit_per_minute: config.rate_limit_per_minute,
            })
            .build()?,
    );

    let health = Arc::new(HealthAggregator::new(
        pipeline.breaker().clone(),
        pipeline.global_limiter().clone(),
        pipeline.per_chat_limiter().clone(),
        pipeline.cache().clone(),
    ));

    if let Some(port) = config.health_port {
        let health = health.clone();
        let metrics = pipeline.metrics().clone();
        tokio::spawn(async move {
            if let Err(error) = admin::serve(port, health, metrics).await {
                tracing::error!(%error, "health surface stopped");
            }
        });
    }

    if let Some(port) = config.webhook_port {
        let queue = UpdateQueue::new();
        let secret = config.webhook_secret.clone();
        tokio::spawn(async move {
            if let Err(error) = webhook::serve(port, queue, secret).await {
                tracing::error!(%error, "webhook receiver stopped");
            }
        });
    }

    // Register the webhook with the platform when one is configured,
    // through the same pipeline as any other call.
    if let Some(url) = &config.webhook_url {
        let mut params = json!({ "url": url });
        if let Some(secret) = &config.webhook_secret {
            params["secret_token"] = json!(secret);
        }
        let reply = pipeline.invoke("set_webhook", params, InvokeOptions::default()).await;
        if reply.ok {
            tracing::info!("webhook registered with the platform");
        } else {
            tracing::warn!(description = reply.description.as_deref(), "webhook registration failed");
        }
    }

    let surface = ToolSurface::new(pipeline, config.tool_mode);

    if let Some(port) = config.tool_http_port {
        let surface = surface.clone();
        let auth = config.tool_auth_token.clone();
        tokio::spawn(async move {
            if let Err(error) = tool::http::serve(port, surface, auth).await {
                tracing::error!(%error, "tool http transport stopped");
            }
        });
    }

    tokio::select! {
        served = tool::stdio::serve(surface) => {
            served?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
    Ok(())
}
