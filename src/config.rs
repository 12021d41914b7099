use std::time::Duration;

/// Runtime options, read from the environment with fixed fallbacks.
///
/// Every outbound HTTP call and the fastest-database race share
/// `http_request_timeout`; `cache_bytes` bounds each node's resident cache.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deadline for each outbound HTTP call and for the miss race.
    pub http_request_timeout: Duration,
    /// Per-node byte budget for the LRU group.
    pub cache_bytes: u64,
    /// Default master bind / dial address.
    pub cache_master_addr: String,
    /// Metadata-store key under which the master persists the roster.
    pub cache_nodes_key: String,
    /// Period of the master's membership broadcast.
    pub heartbeat_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_request_timeout: Duration::from_millis(1000),
            cache_bytes: 64 << 20,
            cache_master_addr: "127.0.0.1:5550".to_string(),
            cache_nodes_key: "oncekv.cache.nodes".to_string(),
            heartbeat_period: Duration::from_secs(1),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let http_request_timeout = std::env::var("HTTP_REQUEST_TIMEOUT_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.http_request_timeout);

        let cache_bytes = std::env::var("CACHE_BYTES")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(defaults.cache_bytes);

        let cache_master_addr =
            std::env::var("CACHE_MASTER_ADDR").unwrap_or(defaults.cache_master_addr);

        let cache_nodes_key =
            std::env::var("CACHE_NODES_KEY").unwrap_or(defaults.cache_nodes_key);

        let heartbeat_period = std::env::var("HEARTBEAT_PERIOD_MS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.heartbeat_period);

        Self {
            http_request_timeout,
            cache_bytes,
            cache_master_addr,
            cache_nodes_key,
            heartbeat_period,
        }
    }
}
