use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use yield_engine_ratelimit::ReadGateway;

use crate::{ChainClient, SolveError};

/// Cache key for one (owner, spender, token, chain) allowance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AllowanceKey {
    pub chain_id: u64,
    pub owner: Address,
    pub spender: Address,
    pub token: Address,
}

/// One cached allowance. `generation` increments on every local optimistic
/// write so callers can tell our own updates apart from on-chain re-reads.
#[derive(Clone, Debug)]
pub struct AllowanceRecord {
    pub amount: U256,
    pub fetched_at: DateTime<Utc>,
    pub generation: u64,
}

/// Read-through allowance cache.
///
/// Reads go through the rate gateway; entries are only ever updated by an
/// on-chain re-read or by `record_approval` after a confirmed approval,
/// never decremented speculatively.
pub struct AllowanceStore {
    client: Arc<dyn ChainClient>,
    gateway: Arc<ReadGateway>,
    cache: RwLock<HashMap<AllowanceKey, AllowanceRecord>>,
}

impl AllowanceStore {
    pub fn new(client: Arc<dyn ChainClient>, gateway: Arc<ReadGateway>) -> Self {
        Self {
            client,
            gateway,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The underlying chain client, shared with solvers that write approvals.
    pub fn client(&self) -> &Arc<dyn ChainClient> {
        &self.client
    }

    /// Current allowance, from cache unless `force_refresh` or absent.
    pub async fn get(&self, key: AllowanceKey, force_refresh: bool) -> Result<U256, SolveError> {
        if !force_refresh {
            if let Some(record) = self.cache.read().await.get(&key) {
                return Ok(record.amount);
            }
        }

        self.gateway.acquire(key.chain_id).await?;
        let amount = self
            .client
            .allowance(key.chain_id, key.token, key.owner, key.spender)
            .await
            .map_err(|e| SolveError::Internal(format!("allowance read failed: {e}")))?;

        let mut cache = self.cache.write().await;
        let generation = cache.get(&key).map_or(0, |record| record.generation);
        cache.insert(
            key,
            AllowanceRecord {
                amount,
                fetched_at: Utc::now(),
                generation,
            },
        );
        Ok(amount)
    }

    /// Optimistic bump after a confirmed approval transaction.
    pub async fn record_approval(&self, key: AllowanceKey, amount: U256) {
        let mut cache = self.cache.write().await;
        let generation = cache.get(&key).map_or(0, |record| record.generation) + 1;
        debug!(
            chain_id = key.chain_id,
            spender = %key.spender,
            generation,
            "recording approved allowance"
        );
        cache.insert(
            key,
            AllowanceRecord {
                amount,
                fetched_at: Utc::now(),
                generation,
            },
        );
    }

    pub async fn record(&self, key: AllowanceKey) -> Option<AllowanceRecord> {
        self.cache.read().await.get(&key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MockChainClient;

    fn key() -> AllowanceKey {
        AllowanceKey {
            chain_id: 1,
            owner: Address::repeat_byte(0x11),
            spender: Address::repeat_byte(0x22),
            token: Address::repeat_byte(0x33),
        }
    }

    fn store(client: Arc<MockChainClient>) -> AllowanceStore {
        AllowanceStore::new(client, Arc::new(ReadGateway::new()))
    }

    #[tokio::test]
    async fn test_read_through_and_cache() {
        let client = Arc::new(MockChainClient::new());
        client.set_allowance(1, Address::repeat_byte(0x33), Address::repeat_byte(0x11), Address::repeat_byte(0x22), U256::from(500u64));
        let store = store(client.clone());

        assert_eq!(store.get(key(), false).await.unwrap(), U256::from(500u64));
        assert_eq!(client.allowance_reads(), 1);

        // Second read is served from cache.
        assert_eq!(store.get(key(), false).await.unwrap(), U256::from(500u64));
        assert_eq!(client.allowance_reads(), 1);
    }

    #[tokio::test]
    async fn test_force_refresh_re_reads() {
        let client = Arc::new(MockChainClient::new());
        let store = store(client.clone());

        store.get(key(), false).await.unwrap();
        store.get(key(), true).await.unwrap();
        assert_eq!(client.allowance_reads(), 2);
    }

    #[tokio::test]
    async fn test_approval_bumps_generation() {
        let client = Arc::new(MockChainClient::new());
        let store = store(client);

        store.get(key(), false).await.unwrap();
        assert_eq!(store.record(key()).await.unwrap().generation, 0);

        store.record_approval(key(), U256::MAX).await;
        let record = store.record(key()).await.unwrap();
        assert_eq!(record.generation, 1);
        assert_eq!(record.amount, U256::MAX);

        store.record_approval(key(), U256::MAX).await;
        assert_eq!(store.record(key()).await.unwrap().generation, 2);
    }

    #[tokio::test]
    async fn test_re_read_preserves_generation() {
        let client = Arc::new(MockChainClient::new());
        let store = store(client);

        store.record_approval(key(), U256::MAX).await;
        store.get(key(), true).await.unwrap();
        assert_eq!(store.record(key()).await.unwrap().generation, 1);
    }

    #[tokio::test]
    async fn test_optimistic_value_served_without_network() {
        let client = Arc::new(MockChainClient::new());
        let store = store(client.clone());

        store.record_approval(key(), U256::MAX).await;
        assert_eq!(store.get(key(), false).await.unwrap(), U256::MAX);
        assert_eq!(client.allowance_reads(), 0);
    }
}
