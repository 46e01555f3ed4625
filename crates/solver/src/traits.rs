use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use yield_engine_types::{ExecutionRequest, NormalizedAmount, Quote, UnsignedOrder, Venue};

use crate::SolveError;

/// Core trait every settlement venue implements.
///
/// Callback-style completion of the source design is expressed as
/// `Result`-returning futures: one terminal outcome, delivered exactly once.
/// No solver retries anything on its own; retry policy belongs to the
/// orchestrator's caller.
#[async_trait]
pub trait Solver: Send + Sync {
    /// Venue this solver settles against.
    fn venue(&self) -> Venue;

    /// Validate the request and produce a quote, caching it by token pair.
    async fn init(&self, request: &ExecutionRequest) -> Result<Quote, SolveError>;

    /// Re-quote the pair and replace the cached entry.
    async fn refresh_quote(&self, request: &ExecutionRequest) -> Result<Quote, SolveError>;

    /// Current allowance for the venue's spender, read through the cache
    /// unless `force_refresh`.
    async fn retrieve_allowance(
        &self,
        request: &ExecutionRequest,
        force_refresh: bool,
    ) -> Result<NormalizedAmount, SolveError>;

    /// Issue an approval for `amount` (conventionally `U256::MAX`) to the
    /// venue's spender; bumps the allowance cache on confirmation.
    async fn approve(
        &self,
        request: &ExecutionRequest,
        amount: U256,
    ) -> Result<TxReceipt, SolveError>;

    /// Venue-specific deposit settlement.
    async fn execute_deposit(&self, request: &ExecutionRequest)
        -> Result<Settlement, SolveError>;

    /// Venue-specific withdrawal settlement.
    async fn execute_withdraw(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Settlement, SolveError>;
}

/// Receipt of a mined transaction. `status == 0` means reverted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub status: u64,
}

impl TxReceipt {
    pub fn reverted(&self) -> bool {
        self.status == 0
    }
}

/// Pre-built transaction payload submitted verbatim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawTransaction {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: U256,
}

/// Terminal settlement handle: a mined receipt for on-chain venues, an order
/// id for the off-chain order book.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Settlement {
    OnChain { receipt: TxReceipt },
    Order { order_id: String },
}

/// On-chain read/write collaborator. Implementations wrap whatever RPC stack
/// the host application uses; the engine only depends on this contract.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError>;

    async fn approve(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxReceipt, ChainError>;

    async fn vault_deposit(
        &self,
        chain_id: u64,
        vault: Address,
        from: Address,
        amount: U256,
    ) -> Result<TxReceipt, ChainError>;

    async fn vault_withdraw(
        &self,
        chain_id: u64,
        vault: Address,
        from: Address,
        amount: U256,
    ) -> Result<TxReceipt, ChainError>;

    async fn send_transaction(
        &self,
        chain_id: u64,
        from: Address,
        tx: RawTransaction,
    ) -> Result<TxReceipt, ChainError>;

    async fn native_balance(&self, chain_id: u64, owner: Address) -> Result<U256, ChainError>;

    async fn gas_price(&self, chain_id: u64) -> Result<U256, ChainError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("transaction reverted: {0}")]
    Reverted(String),
}

/// Wallet collaborator producing typed-data signatures over orders.
#[async_trait]
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    async fn sign_order(&self, order: &UnsignedOrder) -> Result<Bytes, SignerError>;
}

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("no signer connected")]
    Unavailable,

    #[error("signature request rejected")]
    Rejected,
}

/// Token metadata oracle: decimals per (chain, token).
#[async_trait]
pub trait TokenRegistry: Send + Sync {
    async fn decimals(&self, chain_id: u64, token: Address) -> Result<u8, ChainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receipt_revert_flag() {
        let mined = TxReceipt {
            tx_hash: B256::repeat_byte(0x01),
            status: 1,
        };
        assert!(!mined.reverted());

        let reverted = TxReceipt {
            tx_hash: B256::repeat_byte(0x02),
            status: 0,
        };
        assert!(reverted.reverted());
    }
}
