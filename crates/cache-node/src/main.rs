mod config;
mod error;
mod http;

use cache_register::StatusRegister;
use cache_replicator::Replicator;
use cache_upstream::{UpstreamClient, UpstreamClientConfig, UpstreamGateway};
use config::NodeConfig;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const GATEWAY_MAILBOX_CAPACITY: usize = 64;
const REPLICATOR_MAILBOX_CAPACITY: usize = 256;
const GOSSIP_BROADCAST_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config_path = env::var("CACHE_NODE_CONFIG").unwrap_or_else(|_| "cache-node.toml".to_string());
    let node_config = NodeConfig::load(&config_path)?;
    tracing::info!(node_id = %node_config.node_id, "starting node");

    let client = UpstreamClient::new(UpstreamClientConfig {
        base_url: node_config.upstream_base_url.clone(),
        node_id: node_config.node_id.clone(),
        response_timeout: Duration::from_secs(node_config.upstream_response_timeout_secs),
        failure_threshold: node_config.circuit_breaker_failure_threshold,
        open_duration: Duration::from_secs(node_config.circuit_breaker_open_duration_secs),
        max_retries: node_config.retry_max_retries,
        base_delay: Duration::from_millis(node_config.retry_base_delay_ms),
        max_delay: Duration::from_millis(node_config.retry_max_delay_ms),
        jitter_factor: node_config.retry_jitter_factor,
    });
    let gateway = UpstreamGateway::spawn(client, GATEWAY_MAILBOX_CAPACITY);

    let register = Arc::new(StatusRegister::new(node_config.cluster_peers.clone()));
    Arc::clone(&register).spawn_periodic_broadcast(GOSSIP_BROADCAST_INTERVAL);

    let replicator = Replicator::spawn(
        node_config.to_replicator_config(),
        gateway.clone(),
        Arc::clone(&register),
        REPLICATOR_MAILBOX_CAPACITY,
    );

    let state = http::AppState {
        replicator,
        gateway,
        register,
    };
    let app = http::router(state);

    let addr = format!("0.0.0.0:{}", node_config.http_port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
