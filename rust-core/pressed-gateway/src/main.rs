// SPDX-License-Identifier: PMPL-1.0-or-later
//! Pressed access gateway binary
//!
//! Loads `PRESSED_*` configuration from the environment and starts the gateway.

use pressed_gateway::GatewayConfig;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    if std::env::var("PRESSED_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let config = GatewayConfig::from_env()?;

    tracing::info!(
        auth_url = %config.auth_url,
        upstream = ?config.upstream_url,
        role_cache_ttl_secs = config.role_cache_ttl_secs,
        "Starting Pressed access gateway on {}:{}",
        config.host,
        config.port
    );

    pressed_gateway::serve(config).await?;

    Ok(())
}
