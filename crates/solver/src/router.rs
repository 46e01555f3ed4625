use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use yield_engine_types::{
    apply_slippage_bps, ExecutionRequest, NormalizedAmount, Quote, TokenPair, Venue,
};

use crate::{
    AllowanceKey, AllowanceStore, ChainClient, ChainError, RawTransaction, Settlement,
    SolveError, Solver, TokenRegistry, TxReceipt,
};

/// Quote request forwarded to the external aggregator.
///
/// The destination chain id is always populated so cross-chain routes are
/// never collapsed into same-chain ones.
#[derive(Clone, Debug, Serialize)]
pub struct EstimateRequest {
    pub chain_id: u64,
    pub dest_chain_id: u64,
    pub from: Address,
    pub input_token: Address,
    pub output_token: Address,
    pub input_amount: U256,
    pub slippage_bps: u16,
}

impl EstimateRequest {
    pub fn from_request(request: &ExecutionRequest, slippage_bps: u16) -> Self {
        Self {
            chain_id: request.chain_id,
            dest_chain_id: request.dest_chain_id.unwrap_or(request.chain_id),
            from: request.from,
            input_token: request.input_token,
            output_token: request.output_token,
            input_amount: request.amount,
            slippage_bps,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct EstimateResponse {
    pub output_token: Address,
    pub output_amount: U256,
    pub min_output_amount: Option<U256>,
    pub output_token_decimals: u8,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ApprovalResponse {
    pub should_approve: bool,
    pub spender: Option<Address>,
    pub allowance: Option<U256>,
    pub error: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TransactionResponse {
    pub to: Address,
    pub data: Bytes,
    pub value: U256,
    pub gas_limit: U256,
    pub error: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ZapApiError {
    #[error("http error: {0}")]
    Http(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// External aggregator surface: estimate, approval, transaction.
#[async_trait]
pub trait ZapApi: Send + Sync {
    async fn estimate(&self, request: &EstimateRequest) -> Result<EstimateResponse, ZapApiError>;

    async fn approval(&self, request: &EstimateRequest) -> Result<ApprovalResponse, ZapApiError>;

    async fn transaction(
        &self,
        request: &EstimateRequest,
    ) -> Result<TransactionResponse, ZapApiError>;
}

/// HTTP client for the aggregator API.
pub struct ZapHttpClient {
    base_url: String,
    client: reqwest::Client,
}

impl ZapHttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn post_json<Resp: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        request: &EstimateRequest,
    ) -> Result<Resp, ZapApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("querying aggregator: {} with {:?}", url, request);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| ZapApiError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("aggregator API error: {} - {}", status, body);
            return Err(ZapApiError::Http(format!("HTTP {}: {}", status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| ZapApiError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ZapApi for ZapHttpClient {
    async fn estimate(&self, request: &EstimateRequest) -> Result<EstimateResponse, ZapApiError> {
        self.post_json("/v1/estimate", request).await
    }

    async fn approval(&self, request: &EstimateRequest) -> Result<ApprovalResponse, ZapApiError> {
        self.post_json("/v1/approval", request).await
    }

    async fn transaction(
        &self,
        request: &EstimateRequest,
    ) -> Result<TransactionResponse, ZapApiError> {
        self.post_json("/v1/transaction", request).await
    }
}

/// Input left for a native MAX deposit after reserving projected gas with a
/// 20% safety margin. Zero when the reserve meets or exceeds the balance.
pub fn native_input_after_gas_reserve(
    balance: U256,
    gas_estimate: U256,
    gas_price: U256,
) -> U256 {
    let reserve = gas_estimate * gas_price * U256::from(12u64) / U256::from(10u64);
    balance.saturating_sub(reserve)
}

/// Swap-then-deposit settlement through the external aggregator.
///
/// The solver trusts the aggregator for routing and calldata; it only adds
/// slippage protection, approval targeting, and receipt checks.
pub struct RouterSolver {
    api: Arc<dyn ZapApi>,
    chain: Arc<dyn ChainClient>,
    registry: Arc<dyn TokenRegistry>,
    allowances: Arc<AllowanceStore>,
    slippage_bps: u16,
    quote_ttl: Duration,
    quotes: RwLock<HashMap<TokenPair, Quote>>,
    spenders: RwLock<HashMap<TokenPair, Address>>,
}

impl RouterSolver {
    pub fn new(
        api: Arc<dyn ZapApi>,
        chain: Arc<dyn ChainClient>,
        registry: Arc<dyn TokenRegistry>,
        allowances: Arc<AllowanceStore>,
    ) -> Self {
        Self {
            api,
            chain,
            registry,
            allowances,
            slippage_bps: 50,
            quote_ttl: Duration::from_secs(60),
            quotes: RwLock::new(HashMap::new()),
            spenders: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u16) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }

    pub fn with_quote_ttl(mut self, quote_ttl: Duration) -> Self {
        self.quote_ttl = quote_ttl;
        self
    }

    /// Balance available for a native MAX deposit on `chain_id`.
    pub async fn max_native_input(
        &self,
        chain_id: u64,
        owner: Address,
        gas_estimate: U256,
    ) -> Result<U256, SolveError> {
        let balance = self
            .chain
            .native_balance(chain_id, owner)
            .await
            .map_err(internal)?;
        let gas_price = self.chain.gas_price(chain_id).await.map_err(internal)?;
        Ok(native_input_after_gas_reserve(balance, gas_estimate, gas_price))
    }

    async fn quote_request(&self, request: &ExecutionRequest) -> Result<Quote, SolveError> {
        let estimate = self
            .api
            .estimate(&EstimateRequest::from_request(request, self.slippage_bps))
            .await
            .map_err(|e| SolveError::QuoteError(e.to_string()))?;
        if let Some(error) = estimate.error {
            return Err(SolveError::QuoteError(error));
        }

        let expected =
            NormalizedAmount::from_raw(estimate.output_amount, estimate.output_token_decimals);
        let local_min = apply_slippage_bps(&expected, self.slippage_bps);

        // The more conservative of the aggregator's figure and the local
        // slippage tolerance wins.
        let min_out = match estimate.min_output_amount {
            Some(server_min) if server_min < local_min.raw() => {
                NormalizedAmount::from_raw(server_min, estimate.output_token_decimals)
            }
            _ => local_min,
        };

        Ok(Quote::new(Venue::Router, expected, min_out, self.slippage_bps))
    }

    /// Spender the aggregator's approval endpoint designates for this pair.
    async fn spender_for(&self, request: &ExecutionRequest) -> Result<Address, SolveError> {
        if let Some(spender) = self.spenders.read().await.get(&request.pair()) {
            return Ok(*spender);
        }

        let approval = self
            .api
            .approval(&EstimateRequest::from_request(request, self.slippage_bps))
            .await
            .map_err(|e| SolveError::QuoteError(e.to_string()))?;
        if let Some(error) = approval.error {
            return Err(SolveError::QuoteError(error));
        }
        let spender = approval
            .spender
            .ok_or_else(|| SolveError::QuoteError("approval response missing spender".into()))?;

        self.spenders.write().await.insert(request.pair(), spender);
        Ok(spender)
    }

    async fn allowance_key(&self, request: &ExecutionRequest) -> Result<AllowanceKey, SolveError> {
        Ok(AllowanceKey {
            chain_id: request.chain_id,
            owner: request.from,
            spender: self.spender_for(request).await?,
            token: request.input_token,
        })
    }

    /// Guard: a cached quote must exist and be inside the freshness window.
    async fn ensure_fresh_quote(&self, request: &ExecutionRequest) -> Result<Quote, SolveError> {
        match self.quotes.read().await.get(&request.pair()) {
            Some(quote) if quote.is_fresh(self.quote_ttl) => Ok(quote.clone()),
            Some(_) => Err(SolveError::StaleQuote),
            None => Err(SolveError::Internal(
                "no quote for pair; call init first".to_string(),
            )),
        }
    }

    /// Fetch the aggregator's transaction payload and submit it verbatim.
    async fn settle(&self, request: &ExecutionRequest) -> Result<Settlement, SolveError> {
        let quote = self.ensure_fresh_quote(request).await?;
        let tx = self
            .api
            .transaction(&EstimateRequest::from_request(request, self.slippage_bps))
            .await
            .map_err(|e| SolveError::QuoteError(e.to_string()))?;
        if let Some(error) = tx.error {
            return Err(SolveError::QuoteError(error));
        }

        info!(
            chain_id = request.chain_id,
            to = %tx.to,
            min_out = %quote.min_out,
            "submitting aggregator transaction"
        );
        let receipt = self
            .chain
            .send_transaction(
                request.chain_id,
                request.from,
                RawTransaction {
                    to: tx.to,
                    data: tx.data,
                    value: tx.value,
                    gas_limit: tx.gas_limit,
                },
            )
            .await
            .map_err(execution_error)?;
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
impl Solver for RouterSolver {
    fn venue(&self) -> Venue {
        Venue::Router
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
        let key = self.allowance_key(request).await?;
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
        let key = self.allowance_key(request).await?;
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
            "router approval confirmed"
        );
        Ok(receipt)
    }

    async fn execute_deposit(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Settlement, SolveError> {
        self.settle(request).await
    }

    async fn execute_withdraw(
        &self,
        request: &ExecutionRequest,
    ) -> Result<Settlement, SolveError> {
        self.settle(request).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockChainClient, MockTokenRegistry, MockZapApi};
    use yield_engine_ratelimit::ReadGateway;
    use yield_engine_types::Direction;

    fn addr(byte: u8) -> Address {
        Address::repeat_byte(byte)
    }

    fn request() -> ExecutionRequest {
        ExecutionRequest::builder()
            .chain_id(1)
            .from(addr(0x11))
            .input_token(addr(0x22))
            .output_token(addr(0x33))
            .amount(U256::from(500_000_000u64))
            .direction(Direction::Deposit)
            .build()
            .unwrap()
    }

    fn solver(api: Arc<MockZapApi>, client: Arc<MockChainClient>) -> RouterSolver {
        let allowances = Arc::new(AllowanceStore::new(
            client.clone(),
            Arc::new(ReadGateway::new()),
        ));
        RouterSolver::new(api, client, Arc::new(MockTokenRegistry::new()), allowances)
            .with_slippage_bps(100)
    }

    #[tokio::test]
    async fn test_quote_applies_local_slippage() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        let solver = solver(api, Arc::new(MockChainClient::new()));

        let quote = solver.init(&request()).await.unwrap();
        assert_eq!(quote.venue, Venue::Router);
        assert_eq!(quote.expected_out.raw(), U256::from(1_000_000u64));
        // 100 bps client-side tolerance.
        assert_eq!(quote.min_out.raw(), U256::from(990_000u64));
    }

    #[tokio::test]
    async fn test_more_conservative_server_min_wins() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        api.set_min_output(Some(U256::from(980_000u64)));
        let solver = solver(api, Arc::new(MockChainClient::new()));

        let quote = solver.init(&request()).await.unwrap();
        assert_eq!(quote.min_out.raw(), U256::from(980_000u64));
    }

    #[tokio::test]
    async fn test_less_conservative_server_min_is_ignored() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        api.set_min_output(Some(U256::from(999_999u64)));
        let solver = solver(api, Arc::new(MockChainClient::new()));

        let quote = solver.init(&request()).await.unwrap();
        assert_eq!(quote.min_out.raw(), U256::from(990_000u64));
    }

    #[tokio::test]
    async fn test_aggregator_error_field_fails_quote() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        api.set_estimate_error("no route");
        let client = Arc::new(MockChainClient::new());
        let solver = solver(api, client.clone());

        let err = solver.init(&request()).await.unwrap_err();
        assert!(matches!(err, SolveError::QuoteError(ref reason) if reason == "no route"));
        // Nothing was approved or executed.
        assert_eq!(client.approve_calls(), 0);
        assert_eq!(client.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_execute_submits_payload_verbatim() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        let client = Arc::new(MockChainClient::new());
        let solver = solver(api.clone(), client.clone());

        solver.init(&request()).await.unwrap();
        let settlement = solver.execute_deposit(&request()).await.unwrap();
        assert!(matches!(settlement, Settlement::OnChain { .. }));
        assert_eq!(client.send_calls(), 1);
        assert_eq!(client.last_sent_transaction().unwrap(), api.transaction_payload());
    }

    #[tokio::test]
    async fn test_execute_without_init_fails() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        let solver = solver(api, Arc::new(MockChainClient::new()));

        let err = solver.execute_deposit(&request()).await.unwrap_err();
        assert!(matches!(err, SolveError::Internal(_)));
    }

    #[tokio::test]
    async fn test_stale_quote_blocks_execution() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        let client = Arc::new(MockChainClient::new());
        let solver =
            solver(api, client.clone()).with_quote_ttl(Duration::from_millis(0));

        solver.init(&request()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        let err = solver.execute_deposit(&request()).await.unwrap_err();
        assert!(matches!(err, SolveError::StaleQuote));
        assert_eq!(client.send_calls(), 0);
    }

    #[tokio::test]
    async fn test_spender_comes_from_approval_endpoint() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        api.set_spender(addr(0xAA));
        let client = Arc::new(MockChainClient::new());
        let solver = solver(api, client.clone());

        solver.approve(&request(), U256::MAX).await.unwrap();
        assert_eq!(client.last_approved_spender().unwrap(), addr(0xAA));
    }

    #[tokio::test]
    async fn test_cross_chain_dest_forwarded_to_estimate() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1_000_000u64), 6));
        let solver = solver(api.clone(), Arc::new(MockChainClient::new()));

        let mut cross = request();
        cross.dest_chain_id = Some(10);
        solver.init(&cross).await.unwrap();
        assert_eq!(api.last_estimate_request().unwrap().dest_chain_id, 10);
    }

    #[tokio::test]
    async fn test_max_native_input_reads_balance_and_gas_price() {
        let api = Arc::new(MockZapApi::quoting(U256::from(1u64), 18));
        let client = Arc::new(MockChainClient::new());
        client.set_native_balance(1, addr(0x11), U256::from(1_000_000u64));
        client.set_gas_price(U256::from(1_000u64));
        let solver = solver(api, client);

        let input = solver
            .max_native_input(1, addr(0x11), U256::from(100u64))
            .await
            .unwrap();
        assert_eq!(input, U256::from(880_000u64));
    }

    #[test]
    fn test_gas_reserve_subtracted_from_balance() {
        let balance = U256::from(1_000_000u64);
        // reserve = 100 * 1000 * 1.2 = 120_000
        let input =
            native_input_after_gas_reserve(balance, U256::from(100u64), U256::from(1_000u64));
        assert_eq!(input, U256::from(880_000u64));
    }

    #[test]
    fn test_gas_reserve_exceeding_balance_yields_zero() {
        let balance = U256::from(100_000u64);
        let input =
            native_input_after_gas_reserve(balance, U256::from(100u64), U256::from(1_000u64));
        assert_eq!(input, U256::ZERO);

        // Exactly equal also floors at zero.
        let input = native_input_after_gas_reserve(
            U256::from(120_000u64),
            U256::from(100u64),
            U256::from(1_000u64),
        );
        assert_eq!(input, U256::ZERO);
    }
}
