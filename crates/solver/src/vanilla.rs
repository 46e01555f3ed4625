use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;
use yield_engine_types::{
    Direction, ExecutionRequest, NormalizedAmount, Quote, TokenPair, Venue, NATIVE_TOKEN,
};

use crate::{
    AllowanceKey, AllowanceStore, ChainClient, ChainError, Settlement, SolveError, Solver,
    TokenRegistry, TxReceipt,
};

/// Direct settlement against the vault's own deposit/withdraw entry points.
///
/// Quotes are 1:1 across decimals, carry no slippage, and never go stale.
/// This is the baseline venue and the fallback when no router quote exists.
pub struct VanillaSolver {
    chain: Arc<dyn ChainClient>,
    registry: Arc<dyn TokenRegistry>,
    allowances: Arc<AllowanceStore>,
    /// Wrapper contract that accepts native-asset deposits, per chain.
    wrappers: HashMap<u64, Address>,
    quotes: RwLock<HashMap<TokenPair, Quote>>,
}

impl VanillaSolver {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        registry: Arc<dyn TokenRegistry>,
        allowances: Arc<AllowanceStore>,
    ) -> Self {
        Self {
            chain,
            registry,
            allowances,
            wrappers: HashMap::new(),
            quotes: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_native_wrapper(mut self, chain_id: u64, wrapper: Address) -> Self {
        self.wrappers.insert(chain_id, wrapper);
        self
    }

    /// The vault being entered or exited.
    fn vault(&self, request: &ExecutionRequest) -> Address {
        match request.direction {
            Direction::Deposit => request.output_token,
            Direction::Withdraw => request.input_token,
        }
    }

    /// Allowance target: the vault itself, or the wrapper contract for
    /// native-asset deposits.
    fn spender(&self, request: &ExecutionRequest) -> Result<Address, SolveError> {
        if request.input_token == NATIVE_TOKEN {
            return self
                .wrappers
                .get(&request.chain_id)
                .copied()
                .ok_or(SolveError::NoRoute);
        }
        Ok(self.vault(request))
    }

    fn allowance_key(&self, request: &ExecutionRequest) -> Result<AllowanceKey, SolveError> {
        Ok(AllowanceKey {
            chain_id: request.chain_id,
            owner: request.from,
            spender: self.spender(request)?,
            token: request.input_token,
        })
    }

    async fn quote_request(&self, request: &ExecutionRequest) -> Result<Quote, SolveError> {
        let (input_decimals, output_decimals) = futures::try_join!(
            self.registry.decimals(request.chain_id, request.input_token),
            self.registry.decimals(request.chain_id, request.output_token),
        )
        .map_err(internal)?;

        let expected = NormalizedAmount::from_raw(request.amount, input_decimals)
            .rescaled(output_decimals);
        Ok(Quote::new(Venue::Vanilla, expected.clone(), expected, 0))
    }

    fn check_receipt(receipt: TxReceipt) -> Result<Settlement, SolveError> {
        if receipt.reverted() {
            return Err(SolveError::ExecutionReverted(format!(
                "receipt {} has status 0",
                receipt.tx_hash
            )));
        }
        Ok(Settlement::OnChain { receipt })
    }
}

#[async_trait]
impl Solver for VanillaSolver {
    fn venue(&self) -> Venue {
        Venue::Vanilla
    }

    async fn init(&self, request: &ExecutionRequest) -> Result<Quote, SolveError> {
        request.validate()?;
        let quote = self.quote_request(request).await?;
        self.quotes.write().await.insert(request.pair(), quote.clone());
        Ok(quote)
    }

    async fn refresh_quote(&self, request: &ExecutionRequest) -> Result<Quote, SolveError> {
        self.init(request).await
    }

    async fn retrieve_allowance(
        &self,
        request: &ExecutionRequest,
        force_refresh: bool,
    ) -> Result<NormalizedAmount, SolveError> {
        // Native deposits move value with the call; nothing to approve.
        if request.input_token == NATIVE_TOKEN {
            return Ok(NormalizedAmount::from_raw(U256::MAX, 18));
        }

        let key = self.allowance_key(request)?;
        let raw = self.allowances.get(key, force_refresh).await?;
        let decimals = self
            .registry
            .decimals(request.chain_id, request.input_token)
            .await
            .map_err(internal)?;
        Ok(NormalizedAmount::from_raw(raw, decimals))
    }

    async fn approve(
        &self,
        request: &ExecutionRequest,
        amount: U256,
    ) -> Result<TxReceipt, SolveError> {
        if request.input_token == NATIVE_TOKEN {
            return Err(SolveError::Internal(
                "native asset requires no approval".to_string(),
            ));
        }

        let key = self.allowance_key(request)?;
        let receipt = self
            .chain
            .approve(request.chain_id, key.token, key.owner, key.spender, amount)
            .await
            .map_err(|e| match e {
                ChainError::Reverted(reason) => SolveError::ApprovalReverted(reason),
                ChainError::Rpc(reason) => SolveError::Internal(reason),
            })?;
        if receipt.reverted() {
            return Err(SolveError::ApprovalReverted(format!(
                "receipt {} has status 0",
                receipt.tx_hash
            )));
        }

        self.allowances.record_approval(key, amount).await;
        info!(
            chain_id = request.chain_id,
            spender = %key.spender,
            "vault approval confirmed"
        );
        Ok(receipt)
    }

    async fn execute_deposit(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Settlement, SolveError> {
        let vault = self.vault(request);
        info!(
            chain_id = request.chain_id,
            vault = %vault,
            amount = %request.amount,
            "executing vanilla deposit"
        );
        let receipt = self
            .chain
            .vault_deposit(request.chain_id, vault, request.from, request.amount)
            .await
            .map_err(execution_error)?;
        Self::check_receipt(receipt)
    }

    async fn execute_withdraw(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Settlement, SolveError> {
        let vault = self.vault(request);
        info!(
            chain_id = request.chain_id,
            vault = %vault,
            amount = %request.amount,
            "executing vanilla withdrawal"
        );
        let receipt = self
            .chain
            .vault_withdraw(request.chain_id, vault, request.from, request.amount)
            .await
            .map_err(execution_error)?;
        Self::check_receipt(receipt)
    }
}

fn internal(err: ChainError) -> SolveError {
    SolveError::Internal(err.to_string())
}

fn execution_error(err: ChainError) -> SolveError {
    match err {
        ChainError::Reverted(reason) => SolveError::ExecutionReverted(reason),
        ChainError::Rpc(reason) => SolveError::Internal(reason),
    }
}
