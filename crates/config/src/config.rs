//! Core configuration structures for the vault solver engine

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Chain configurations by name
    #[serde(default)]
    pub chains: HashMap<String, ChainConfig>,

    /// Solver behavior
    #[serde(default)]
    pub solver: SolverSettings,

    /// External service endpoints
    #[serde(default)]
    pub endpoints: EndpointConfig,
}

/// Configuration for one chain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Numeric chain identifier
    pub chain_id: u64,

    /// RPC endpoint URL
    pub rpc_url: String,

    /// Wrapper contract accepting native-asset deposits (hex address)
    pub native_wrapper: Option<String>,

    /// Read throttle for rate-sensitive RPC providers; absent means the
    /// chain bypasses the read gateway
    pub rate_limit: Option<RateLimitConfig>,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Sliding-window read throttle parameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Reads allowed per rolling window
    pub max_requests: usize,

    /// Rolling window length in milliseconds
    pub window_ms: u64,

    /// Fixed inter-request delay in milliseconds
    #[serde(default = "default_spacing_ms")]
    pub spacing_ms: u64,
}

/// Solver behavior knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverSettings {
    /// Client-side slippage tolerance in basis points
    #[serde(default = "default_slippage_bps")]
    pub slippage_bps: u16,

    /// Router quote freshness window in seconds
    #[serde(default = "default_router_quote_ttl_secs")]
    pub router_quote_ttl_secs: u64,

    /// Intent quote freshness window in seconds
    #[serde(default = "default_intent_quote_ttl_secs")]
    pub intent_quote_ttl_secs: u64,

    /// Order status poll interval in milliseconds
    #[serde(default = "default_order_poll_interval_ms")]
    pub order_poll_interval_ms: u64,

    /// Order status poll iteration budget
    #[serde(default = "default_order_poll_max_iterations")]
    pub order_poll_max_iterations: u32,

    /// Signed order validity window in seconds
    #[serde(default = "default_order_validity_secs")]
    pub order_validity_secs: u64,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            slippage_bps: default_slippage_bps(),
            router_quote_ttl_secs: default_router_quote_ttl_secs(),
            intent_quote_ttl_secs: default_intent_quote_ttl_secs(),
            order_poll_interval_ms: default_order_poll_interval_ms(),
            order_poll_max_iterations: default_order_poll_max_iterations(),
            order_validity_secs: default_order_validity_secs(),
        }
    }
}

/// External HTTP collaborators
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct EndpointConfig {
    /// Aggregator API base URL
    #[serde(default)]
    pub zap_api_url: String,

    /// Order-book API base URL
    #[serde(default)]
    pub order_book_url: String,

    /// Settlement contract approved to pull intent-order sell tokens
    /// (hex address)
    #[serde(default)]
    pub intent_settlement: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_spacing_ms() -> u64 {
    10
}

fn default_slippage_bps() -> u16 {
    50
}

fn default_router_quote_ttl_secs() -> u64 {
    60
}

fn default_intent_quote_ttl_secs() -> u64 {
    30
}

fn default_order_poll_interval_ms() -> u64 {
    3_000
}

fn default_order_poll_max_iterations() -> u32 {
    100
}

fn default_order_validity_secs() -> u64 {
    1_800
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solver_settings_defaults() {
        let settings = SolverSettings::default();
        assert_eq!(settings.slippage_bps, 50);
        assert_eq!(settings.order_poll_interval_ms, 3_000);
        assert_eq!(settings.order_poll_max_iterations, 100);
    }

    #[test]
    fn test_chain_config_defaults_apply() {
        let chain: ChainConfig = serde_json::from_str(
            r#"{"chain_id": 1, "rpc_url": "https://rpc.example.com", "native_wrapper": null, "rate_limit": null}"#,
        )
        .unwrap();
        assert_eq!(chain.timeout_ms, 30_000);
        assert!(chain.rate_limit.is_none());
    }

    #[test]
    fn test_rate_limit_spacing_default() {
        let limit: RateLimitConfig =
            serde_json::from_str(r#"{"max_requests": 5, "window_ms": 1000}"#).unwrap();
        assert_eq!(limit.spacing_ms, 10);
    }
}
