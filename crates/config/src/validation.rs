//! Configuration validation

use crate::{AppConfig, ChainConfig, ConfigError, Result};

/// Validation error details
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the entire application configuration
pub fn validate_config(config: &AppConfig) -> Result<()> {
    let mut errors = Vec::new();

    if let Err(e) = validate_log_level(&config.log_level) {
        errors.push(e);
    }

    // Validate chains
    for (chain_name, chain_config) in &config.chains {
        if let Err(e) = validate_chain_config(chain_config) {
            errors.push(ValidationError::new(
                format!("chains.{chain_name}"),
                e.to_string(),
            ));
        }
    }

    // Validate solver settings
    if config.solver.slippage_bps > 10000 {
        errors.push(ValidationError::new(
            "solver.slippage_bps",
            "must be <= 10000 (100%)",
        ));
    }

    if config.solver.router_quote_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "solver.router_quote_ttl_secs",
            "must be greater than 0",
        ));
    }

    if config.solver.intent_quote_ttl_secs == 0 {
        errors.push(ValidationError::new(
            "solver.intent_quote_ttl_secs",
            "must be greater than 0",
        ));
    }

    if config.solver.order_poll_interval_ms == 0 {
        errors.push(ValidationError::new(
            "solver.order_poll_interval_ms",
            "must be greater than 0",
        ));
    }

    if config.solver.order_poll_max_iterations == 0 {
        errors.push(ValidationError::new(
            "solver.order_poll_max_iterations",
            "must be greater than 0",
        ));
    }

    if config.solver.order_validity_secs == 0 {
        errors.push(ValidationError::new(
            "solver.order_validity_secs",
            "must be greater than 0",
        ));
    }

    // Validate endpoints
    if config.endpoints.zap_api_url.is_empty() {
        errors.push(ValidationError::new(
            "endpoints.zap_api_url",
            "aggregator endpoint is required",
        ));
    } else if let Err(e) = validate_url(&config.endpoints.zap_api_url) {
        errors.push(ValidationError::new("endpoints.zap_api_url", e));
    }

    if config.endpoints.order_book_url.is_empty() {
        errors.push(ValidationError::new(
            "endpoints.order_book_url",
            "order book endpoint is required",
        ));
    } else if let Err(e) = validate_url(&config.endpoints.order_book_url) {
        errors.push(ValidationError::new("endpoints.order_book_url", e));
    }

    // Return all errors if any were found
    if !errors.is_empty() {
        let error_msg = errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        return Err(ConfigError::ValidationError(error_msg));
    }

    Ok(())
}

/// Validate a chain configuration
pub fn validate_chain_config(chain: &ChainConfig) -> std::result::Result<(), String> {
    if chain.chain_id == 0 {
        return Err("chain_id must be greater than 0".to_string());
    }

    if chain.rpc_url.is_empty() {
        return Err("rpc_url is required".to_string());
    }

    validate_url(&chain.rpc_url)?;

    if let Some(limit) = &chain.rate_limit {
        if limit.max_requests == 0 {
            return Err("rate_limit.max_requests must be greater than 0".to_string());
        }
        if limit.window_ms == 0 {
            return Err("rate_limit.window_ms must be greater than 0".to_string());
        }
    }

    if chain.timeout_ms == 0 {
        return Err("timeout_ms must be greater than 0".to_string());
    }

    Ok(())
}

/// Validate a URL
pub fn validate_url(url: &str) -> std::result::Result<(), String> {
    if url.is_empty() {
        return Err("URL cannot be empty".to_string());
    }

    // Basic URL validation - check for scheme
    if !url.starts_with("http://")
        && !url.starts_with("https://")
        && !url.starts_with("ws://")
        && !url.starts_with("wss://")
    {
        return Err("URL must start with http://, https://, ws://, or wss://".to_string());
    }

    Ok(())
}

/// Validate log level
fn validate_log_level(level: &str) -> std::result::Result<(), ValidationError> {
    match level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ValidationError::new(
            "log_level",
            format!(
                "invalid log level '{level}', must be one of: trace, debug, info, warn, error"
            ),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChainConfig, EndpointConfig, RateLimitConfig, SolverSettings};
    use std::collections::HashMap;

    fn valid_config() -> AppConfig {
        let mut chains = HashMap::new();
        chains.insert(
            "mainnet".to_string(),
            ChainConfig {
                chain_id: 1,
                rpc_url: "https://rpc.example.com".to_string(),
                native_wrapper: None,
                rate_limit: None,
                timeout_ms: 30_000,
            },
        );
        chains.insert(
            "fantom".to_string(),
            ChainConfig {
                chain_id: 250,
                rpc_url: "https://rpc.fantom.example.com".to_string(),
                native_wrapper: None,
                rate_limit: Some(RateLimitConfig {
                    max_requests: 5,
                    window_ms: 1_000,
                    spacing_ms: 10,
                }),
                timeout_ms: 30_000,
            },
        );

        AppConfig {
            log_level: "info".to_string(),
            chains,
            solver: SolverSettings::default(),
            endpoints: EndpointConfig {
                zap_api_url: "https://zap.example.com".to_string(),
                order_book_url: "https://orders.example.com".to_string(),
                intent_settlement: None,
            },
        }
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = AppConfig {
            log_level: "loud".to_string(),
            ..valid_config()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_slippage_bound() {
        let mut config = valid_config();
        config.solver.slippage_bps = 10_001;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_zero_poll_budget() {
        let mut config = valid_config();
        config.solver.order_poll_max_iterations = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_missing_endpoints() {
        let mut config = valid_config();
        config.endpoints.zap_api_url = String::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_chain_config() {
        let valid_chain = ChainConfig {
            chain_id: 1,
            rpc_url: "https://rpc.example.com".to_string(),
            native_wrapper: None,
            rate_limit: None,
            timeout_ms: 30_000,
        };
        assert!(validate_chain_config(&valid_chain).is_ok());

        let invalid_chain = ChainConfig {
            chain_id: 0,
            ..valid_chain.clone()
        };
        assert!(validate_chain_config(&invalid_chain).is_err());

        let zero_window = ChainConfig {
            rate_limit: Some(RateLimitConfig {
                max_requests: 5,
                window_ms: 0,
                spacing_ms: 10,
            }),
            ..valid_chain
        };
        assert!(validate_chain_config(&zero_window).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com").is_ok());
        assert!(validate_url("http://localhost:8080").is_ok());
        assert!(validate_url("ws://localhost:8080").is_ok());
        assert!(validate_url("wss://example.com").is_ok());

        assert!(validate_url("").is_err());
        assert!(validate_url("not-a-url").is_err());
        assert!(validate_url("ftp://example.com").is_err());
    }
}
