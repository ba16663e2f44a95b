use cache_replicator::{ConfigError as ReplicatorConfigError, ReplicatorConfig};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

fn default_node_id() -> String {
    "node-1".to_string()
}

fn default_http_port() -> u16 {
    8080
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_fresh_enough_secs() -> u64 {
    10
}

fn default_background_refresh_secs() -> u64 {
    5
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_open_duration_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    100
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_jitter_factor() -> f64 {
    0.1
}

fn default_response_timeout_secs() -> u64 {
    10
}

fn default_base_url() -> String {
    "https://api.tfl.gov.uk".to_string()
}

/// Process-level configuration, loaded from a TOML file and overridden by
/// `CACHE_NODE_*` environment variables. Field names mirror the recognized
/// options named in the external-interfaces contract.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_fresh_enough_secs")]
    pub fresh_enough_threshold_secs: u64,
    #[serde(default = "default_background_refresh_secs")]
    pub background_refresh_threshold_secs: u64,
    #[serde(default = "default_failure_threshold")]
    pub circuit_breaker_failure_threshold: u32,
    #[serde(default = "default_open_duration_secs")]
    pub circuit_breaker_open_duration_secs: u64,
    #[serde(default = "default_max_retries")]
    pub retry_max_retries: u32,
    #[serde(default = "default_base_delay_ms")]
    pub retry_base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub retry_max_delay_ms: u64,
    #[serde(default = "default_jitter_factor")]
    pub retry_jitter_factor: f64,
    #[serde(default = "default_response_timeout_secs")]
    pub upstream_response_timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub upstream_base_url: String,
    #[serde(default)]
    pub cluster_peers: Vec<String>,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            http_port: default_http_port(),
            refresh_interval_secs: default_refresh_interval_secs(),
            fresh_enough_threshold_secs: default_fresh_enough_secs(),
            background_refresh_threshold_secs: default_background_refresh_secs(),
            circuit_breaker_failure_threshold: default_failure_threshold(),
            circuit_breaker_open_duration_secs: default_open_duration_secs(),
            retry_max_retries: default_max_retries(),
            retry_base_delay_ms: default_base_delay_ms(),
            retry_max_delay_ms: default_max_delay_ms(),
            retry_jitter_factor: default_jitter_factor(),
            upstream_response_timeout_secs: default_response_timeout_secs(),
            upstream_base_url: default_base_url(),
            cluster_peers: Vec::new(),
        }
    }
}

#[derive(Debug, Error)]
pub enum NodeConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid replicator configuration: {0}")]
    Replicator(#[from] ReplicatorConfigError),
}

impl NodeConfig {
    /// Loads configuration from `path` (if it exists; a missing file is not
    /// an error — defaults apply) and then applies `CACHE_NODE_*`
    /// environment variable overrides. Validates the
    /// `background_refresh_threshold_secs < fresh_enough_threshold_secs`
    /// precondition before returning.
    pub fn load(path: &str) -> Result<Self, NodeConfigError> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| NodeConfigError::Parse {
                path: path.to_string(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => NodeConfig::default(),
            Err(source) => {
                return Err(NodeConfigError::Read {
                    path: path.to_string(),
                    source,
                })
            }
        };

        config.apply_env_overrides();
        config.to_replicator_config().validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CACHE_NODE_ID") {
            self.node_id = v;
        }
        if let Ok(v) = std::env::var("CACHE_NODE_HTTP_PORT") {
            if let Ok(port) = v.parse() {
                self.http_port = port;
            }
        }
        if let Ok(v) = std::env::var("CACHE_NODE_UPSTREAM_BASE_URL") {
            self.upstream_base_url = v;
        }
        if let Ok(v) = std::env::var("CACHE_NODE_CLUSTER_PEERS") {
            self.cluster_peers = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect();
        }
    }

    pub fn to_replicator_config(&self) -> ReplicatorConfig {
        ReplicatorConfig {
            node_id: self.node_id.clone(),
            refresh_interval: Duration::from_secs(self.refresh_interval_secs),
            fresh_enough_threshold: Duration::from_secs(self.fresh_enough_threshold_secs),
            background_refresh_threshold: Duration::from_secs(
                self.background_refresh_threshold_secs,
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = NodeConfig::default();
        assert!(config.to_replicator_config().validate().is_ok());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = NodeConfig::load("/nonexistent/path/to/config.toml").unwrap();
        assert_eq!(config.node_id, "node-1");
    }

    #[test]
    fn cluster_peers_env_override_splits_on_comma() {
        std::env::set_var(
            "CACHE_NODE_CLUSTER_PEERS",
            "http://a:8080, http://b:8080",
        );
        let config = NodeConfig::load("/nonexistent/path/to/config.toml").unwrap();
        assert_eq!(
            config.cluster_peers,
            vec!["http://a:8080".to_string(), "http://b:8080".to_string()]
        );
        std::env::remove_var("CACHE_NODE_CLUSTER_PEERS");
    }
}
