use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("read gateway saturated for chain {chain_id}")]
    Saturated { chain_id: u64 },

    #[error("invalid throttle configuration for chain {chain_id}")]
    InvalidConfig { chain_id: u64 },
}

/// Throttle parameters for one chain's RPC provider.
#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Reads allowed inside one rolling window.
    pub max_requests: usize,

    /// Rolling window length.
    pub window: Duration,

    /// Fixed delay added between a slot opening and the retried check.
    pub spacing: Duration,
}

impl ThrottleConfig {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            spacing: Duration::from_millis(10),
        }
    }

    pub fn with_spacing(mut self, spacing: Duration) -> Self {
        self.spacing = spacing;
        self
    }
}

/// Per-chain sliding-window scheduler for on-chain reads.
///
/// Issuance timestamps are recorded when the slot is granted, not when the
/// read completes. Chains without a configured throttle bypass the gateway
/// entirely.
pub struct ReadGateway {
    limits: HashMap<u64, ThrottleConfig>,
    windows: Mutex<HashMap<u64, VecDeque<Instant>>>,
    max_rechecks: u32,
}

impl ReadGateway {
    pub fn new() -> Self {
        Self {
            limits: HashMap::new(),
            windows: Mutex::new(HashMap::new()),
            max_rechecks: 32,
        }
    }

    pub fn with_limit(mut self, chain_id: u64, config: ThrottleConfig) -> Self {
        self.limits.insert(chain_id, config);
        self
    }

    /// Safety net against misconfiguration; the wait-and-recheck loop gives
    /// up after this many rounds.
    pub fn with_max_rechecks(mut self, max_rechecks: u32) -> Self {
        self.max_rechecks = max_rechecks;
        self
    }

    pub fn is_throttled(&self, chain_id: u64) -> bool {
        self.limits.contains_key(&chain_id)
    }

    /// Wait for a read slot on `chain_id`.
    ///
    /// Prunes timestamps older than the window, grants the slot if capacity
    /// remains, and otherwise sleeps until the oldest timestamp leaves the
    /// window (plus the configured spacing) before re-checking.
    pub async fn acquire(&self, chain_id: u64) -> Result<(), GatewayError> {
        let Some(config) = self.limits.get(&chain_id) else {
            return Ok(());
        };
        if config.max_requests == 0 {
            return Err(GatewayError::InvalidConfig { chain_id });
        }

        let mut round = 0;
        loop {
            let wait = {
                let mut windows = self.windows.lock().await;
                let issued = windows.entry(chain_id).or_default();
                let now = Instant::now();

                while issued
                    .front()
                    .is_some_and(|t| now.duration_since(*t) >= config.window)
                {
                    issued.pop_front();
                }

                if issued.len() < config.max_requests {
                    issued.push_back(now);
                    return Ok(());
                }

                match issued.front() {
                    Some(oldest) => {
                        config.window.saturating_sub(now.duration_since(*oldest)) + config.spacing
                    }
                    None => config.spacing,
                }
            };

            if round >= self.max_rechecks {
                warn!(chain_id, "read gateway could not schedule within recheck budget");
                return Err(GatewayError::Saturated { chain_id });
            }
            round += 1;

            debug!(
                chain_id,
                round,
                wait_ms = wait.as_millis() as u64,
                "read gateway full, waiting for a slot"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

impl Default for ReadGateway {
    fn default() -> Self {
        Self::new()
    }
}
