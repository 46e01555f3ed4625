use alloy_primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use yield_engine_types::{
    apply_slippage_bps, ExecutionRequest, IntentOrder, NormalizedAmount, OrderStatus, Quote,
    TokenPair, UnsignedOrder, Venue,
};

use crate::{
    AllowanceKey, AllowanceStore, ChainError, Settlement, SignerError, SolveError, Solver,
    Signer, TokenRegistry, TxReceipt,
};

/// Quote request sent to the order book's pricing endpoint.
#[derive(Clone, Debug, Serialize)]
pub struct OrderQuoteRequest {
    pub chain_id: u64,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: U256,
    pub from: Address,
}

#[derive(Clone, Debug, Deserialize)]
pub struct OrderQuote {
    pub sell_amount: U256,
    pub buy_amount: U256,
    pub buy_token_decimals: u8,
}

/// Order status as reported by the order book. Anything the engine does not
/// recognize counts as still open.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderBookStatus {
    Fulfilled,
    Cancelled,
    Expired,
    #[serde(other)]
    Open,
}

#[derive(Debug, thiserror::Error)]
pub enum OrderBookError {
    #[error("http error: {0}")]
    Http(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("order rejected: {0}")]
    Rejected(String),
}

/// Off-chain order book surface: price, submit, poll.
#[async_trait]
pub trait OrderBookApi: Send + Sync {
    async fn quote_order(&self, request: &OrderQuoteRequest) -> Result<OrderQuote, OrderBookError>;

    /// Post a signed order; returns the order id.
    async fn submit_order(
        &self,
        order: &UnsignedOrder,
        signature: &Bytes,
    ) -> Result<String, OrderBookError>;

    async fn order_status(&self, order_id: &str) -> Result<OrderBookStatus, OrderBookError>;
}

#[derive(Serialize)]
struct SubmitOrderBody<'a> {
    #[serde(flatten)]
    order: &'a UnsignedOrder,
    signature: &'a Bytes,
}

#[derive(Deserialize)]
struct SubmitOrderResponse {
    id: String,
}

#[derive(Deserialize)]
struct OrderStatusResponse {
    status: OrderBookStatus,
}

/// HTTP client for the order-book API.
pub struct OrderBookHttpClient {
    base_url: String,
    client: reqwest::Client,
}

impl OrderBookHttpClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn check<Resp: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<Resp, OrderBookError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("order book API error: {} - {}", status, body);
            return Err(OrderBookError::Http(format!("HTTP {}: {}", status, body)));
        }
        response
            .json()
            .await
            .map_err(|e| OrderBookError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl OrderBookApi for OrderBookHttpClient {
    async fn quote_order(&self, request: &OrderQuoteRequest) -> Result<OrderQuote, OrderBookError> {
        let url = format!("{}/v1/quote", self.base_url);
        debug!("querying order book quote: {} with {:?}", url, request);
        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| OrderBookError::Http(e.to_string()))?;
        Self::check(response).await
    }

    async fn submit_order(
        &self,
        order: &UnsignedOrder,
        signature: &Bytes,
    ) -> Result<String, OrderBookError> {
        let url = format!("{}/v1/orders", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&SubmitOrderBody { order, signature })
            .send()
            .await
            .map_err(|e| OrderBookError::Http(e.to_string()))?;
        let parsed: SubmitOrderResponse = Self::check(response).await?;
        Ok(parsed.id)
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderBookStatus, OrderBookError> {
        let url = format!("{}/v1/orders/{}", self.base_url, order_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| OrderBookError::Http(e.to_string()))?;
        let parsed: OrderStatusResponse = Self::check(response).await?;
        Ok(parsed.status)
    }
}

/// Settlement through a signed off-chain order filled by a solver network.
///
/// The signed order's `buy_amount` is the slippage-adjusted minimum, so the
/// order itself enforces the quoted `min_out` on-chain. Abandoning the action
/// (dropping the in-flight future) stops polling between iterations; no
/// further status transition happens and no outcome is delivered.
pub struct IntentSolver {
    book: Arc<dyn OrderBookApi>,
    signer: Arc<dyn Signer>,
    registry: Arc<dyn TokenRegistry>,
    allowances: Arc<AllowanceStore>,
    /// Settlement contract that pulls the sell token when the order fills.
    settlement_spender: Address,
    slippage_bps: u16,
    quote_ttl: Duration,
    poll_interval: Duration,
    max_polls: u32,
    validity: Duration,
    quotes: RwLock<HashMap<TokenPair, Quote>>,
}

impl IntentSolver {
    pub fn new(
        book: Arc<dyn OrderBookApi>,
        signer: Arc<dyn Signer>,
        registry: Arc<dyn TokenRegistry>,
        allowances: Arc<AllowanceStore>,
        settlement_spender: Address,
    ) -> Self {
        Self {
            book,
            signer,
            registry,
            allowances,
            settlement_spender,
            slippage_bps: 50,
            quote_ttl: Duration::from_secs(30),
            poll_interval: Duration::from_secs(3),
            max_polls: 100,
            validity: Duration::from_secs(30 * 60),
            quotes: RwLock::new(HashMap::new()),
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

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_max_polls(mut self, max_polls: u32) -> Self {
        self.max_polls = max_polls;
        self
    }

    pub fn with_validity(mut self, validity: Duration) -> Self {
        self.validity = validity;
        self
    }

    async fn quote_request(&self, request: &ExecutionRequest) -> Result<Quote, SolveError> {
        let order_quote = self
            .book
            .quote_order(&OrderQuoteRequest {
                chain_id: request.chain_id,
                sell_token: request.input_token,
                buy_token: request.output_token,
                sell_amount: request.amount,
                from: request.from,
            })
            .await
            .map_err(|e| SolveError::QuoteError(e.to_string()))?;

        let expected = NormalizedAmount::from_raw(
            order_quote.buy_amount,
            order_quote.buy_token_decimals,
        );
        let min_out = apply_slippage_bps(&expected, self.slippage_bps);
        Ok(Quote::new(Venue::Intent, expected, min_out, self.slippage_bps))
    }

    async fn ensure_fresh_quote(&self, request: &ExecutionRequest) -> Result<Quote, SolveError> {
        match self.quotes.read().await.get(&request.pair()) {
            Some(quote) if quote.is_fresh(self.quote_ttl) => Ok(quote.clone()),
            Some(_) => Err(SolveError::StaleQuote),
            None => Err(SolveError::Internal(
                "no quote for pair; call init first".to_string(),
            )),
        }
    }

    fn allowance_key(&self, request: &ExecutionRequest) -> AllowanceKey {
        AllowanceKey {
            chain_id: request.chain_id,
            owner: request.from,
            spender: self.settlement_spender,
            token: request.input_token,
        }
    }

    /// Build, sign, submit, and poll one order to a terminal state.
    async fn settle(&self, request: &ExecutionRequest) -> Result<Settlement, SolveError> {
        let quote = self.ensure_fresh_quote(request).await?;
        let valid_to = (Utc::now().timestamp() as u64).saturating_add(self.validity.as_secs());

        let mut tracked = IntentOrder::new(UnsignedOrder {
            chain_id: request.chain_id,
            sell_token: request.input_token,
            buy_token: request.output_token,
            sell_amount: request.amount,
            buy_amount: quote.min_out.raw(),
            receiver: request.from,
            valid_to,
        });

        // Signature failure leaves the order in Created; nothing was posted.
        let signature = self
            .signer
            .sign_order(&tracked.order)
            .await
            .map_err(|e| match e {
                SignerError::Unavailable => SolveError::NoSigner,
                SignerError::Rejected => SolveError::SignatureRejected,
            })?;
        tracked.signature = Some(signature.clone());

        let order_id = self
            .book
            .submit_order(&tracked.order, &signature)
            .await
            .map_err(|e| SolveError::Internal(format!("order submission failed: {e}")))?;
        tracked.order_id = Some(order_id.clone());
        tracked
            .advance(OrderStatus::Submitted)
            .map_err(|e| SolveError::Internal(e.to_string()))?;
        info!(order_id = %order_id, valid_to, "intent order submitted");

        self.poll_until_terminal(&mut tracked).await
    }

    /// Poll the order book until a terminal status or the iteration budget
    /// runs out. The status check happens before each wait, so a first-poll
    /// fill resolves without sleeping.
    pub async fn poll_until_terminal(
        &self,
        tracked: &mut IntentOrder,
    ) -> Result<Settlement, SolveError> {
        let order_id = tracked
            .order_id
            .clone()
            .ok_or_else(|| SolveError::Internal("polling an unsubmitted order".to_string()))?;

        for poll in 1..=self.max_polls {
            match self.book.order_status(&order_id).await {
                Ok(OrderBookStatus::Fulfilled) => {
                    tracked
                        .advance(OrderStatus::Fulfilled)
                        .map_err(|e| SolveError::Internal(e.to_string()))?;
                    info!(order_id = %order_id, polls = poll, "intent order fulfilled");
                    return Ok(Settlement::Order { order_id });
                }
                Ok(OrderBookStatus::Cancelled) => {
                    return self.fail_terminal(tracked, OrderStatus::Cancelled);
                }
                Ok(OrderBookStatus::Expired) => {
                    return self.fail_terminal(tracked, OrderStatus::Expired);
                }
                Ok(OrderBookStatus::Open) => {}
                // A failed status fetch consumes a poll but is not terminal.
                Err(e) => {
                    warn!(order_id = %order_id, error = %e, "order status fetch failed");
                }
            }
            if poll < self.max_polls {
                tokio::time::sleep(self.poll_interval).await;
            }
        }

        tracked
            .advance(OrderStatus::TimedOut)
            .map_err(|e| SolveError::Internal(e.to_string()))?;
        warn!(order_id = %order_id, polls = self.max_polls, "intent order polling timed out");
        Err(SolveError::OrderTimeout {
            polls: self.max_polls,
        })
    }

    fn fail_terminal(
        &self,
        tracked: &mut IntentOrder,
        status: OrderStatus,
    ) -> Result<Settlement, SolveError> {
        tracked
            .advance(status)
            .map_err(|e| SolveError::Internal(e.to_string()))?;
        warn!(status = ?status, "intent order closed without a fill");
        Err(SolveError::OrderCancelledOrExpired { status })
    }
}

#[async_trait]
impl Solver for IntentSolver {
    fn venue(&self) -> Venue {
        Venue::Intent
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
        let key = self.allowance_key(request);
        let raw = self.allowances.get(key, force_refresh).await?;
        let decimals = self
            .registry
            .decimals(request.chain_id, request.input_token)
            .await
            .map_err(|e| SolveError::Internal(e.to_string()))?;
        Ok(NormalizedAmount::from_raw(raw, decimals))
    }

    async fn approve(
        &self,
        request: &ExecutionRequest,
        amount: U256,
    ) -> Result<TxReceipt, SolveError> {
        let key = self.allowance_key(request);
        let receipt = self
            .allowances
            .client()
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
            "settlement approval confirmed"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockChainClient, MockOrderBookApi, MockSigner, MockTokenRegistry};
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
            .amount(U256::from(1_000_000u64))
            .direction(Direction::Deposit)
            .build()
            .unwrap()
    }

    fn solver(book: Arc<MockOrderBookApi>, signer: Arc<MockSigner>) -> IntentSolver {
        let client = Arc::new(MockChainClient::new());
        let allowances = Arc::new(AllowanceStore::new(client, Arc::new(ReadGateway::new())));
        IntentSolver::new(
            book,
            signer,
            Arc::new(MockTokenRegistry::new()),
            allowances,
            addr(0x55),
        )
        .with_poll_interval(Duration::from_millis(5))
        .with_max_polls(5)
    }

    #[tokio::test]
    async fn test_order_buy_amount_is_slippage_adjusted_minimum() {
        let book = Arc::new(MockOrderBookApi::quoting(U256::from(1_000_000u64), 6));
        book.push_status(OrderBookStatus::Fulfilled);
        let solver = solver(book.clone(), Arc::new(MockSigner::signing()))
            .with_slippage_bps(100);

        solver.init(&request()).await.unwrap();
        solver.execute_deposit(&request()).await.unwrap();

        let submitted = book.last_submitted_order().unwrap();
        assert_eq!(submitted.buy_amount, U256::from(990_000u64));
        assert_eq!(submitted.sell_amount, U256::from(1_000_000u64));
    }

    #[tokio::test]
    async fn test_fulfilled_on_first_poll_resolves_after_one_check() {
        let book = Arc::new(MockOrderBookApi::quoting(U256::from(1_000_000u64), 6));
        book.push_status(OrderBookStatus::Fulfilled);
        let solver = solver(book.clone(), Arc::new(MockSigner::signing()));

        solver.init(&request()).await.unwrap();
        let start = std::time::Instant::now();
        let settlement = solver.execute_deposit(&request()).await.unwrap();

        assert!(matches!(settlement, Settlement::Order { .. }));
        assert_eq!(book.status_calls(), 1);
        // No poll interval was awaited.
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_expired_on_third_poll_stops_polling() {
        let book = Arc::new(MockOrderBookApi::quoting(U256::from(1_000_000u64), 6));
        book.push_status(OrderBookStatus::Open);
        book.push_status(OrderBookStatus::Open);
        book.push_status(OrderBookStatus::Expired);
        let solver = solver(book.clone(), Arc::new(MockSigner::signing()));

        solver.init(&request()).await.unwrap();
        let err = solver.execute_deposit(&request()).await.unwrap_err();

        assert!(matches!(
            err,
            SolveError::OrderCancelledOrExpired {
                status: OrderStatus::Expired
            }
        ));
        assert_eq!(book.status_calls(), 3);
    }

    #[tokio::test]
    async fn test_poll_budget_exhaustion_times_out() {
        let book = Arc::new(MockOrderBookApi::quoting(U256::from(1_000_000u64), 6));
        // Script stays empty: every poll reports Open.
        let solver = solver(book.clone(), Arc::new(MockSigner::signing()));

        solver.init(&request()).await.unwrap();
        let err = solver.execute_deposit(&request()).await.unwrap_err();

        assert!(matches!(err, SolveError::OrderTimeout { polls: 5 }));
        assert_eq!(book.status_calls(), 5);
    }

    #[tokio::test]
    async fn test_no_signer_fails_before_submission() {
        let book = Arc::new(MockOrderBookApi::quoting(U256::from(1_000_000u64), 6));
        let solver = solver(book.clone(), Arc::new(MockSigner::unavailable()));

        solver.init(&request()).await.unwrap();
        let err = solver.execute_deposit(&request()).await.unwrap_err();

        assert!(matches!(err, SolveError::NoSigner));
        assert_eq!(book.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_rejected_signature_fails_before_submission() {
        let book = Arc::new(MockOrderBookApi::quoting(U256::from(1_000_000u64), 6));
        let solver = solver(book.clone(), Arc::new(MockSigner::rejecting()));

        solver.init(&request()).await.unwrap();
        let err = solver.execute_deposit(&request()).await.unwrap_err();

        assert!(matches!(err, SolveError::SignatureRejected));
        assert_eq!(book.submit_calls(), 0);
    }

    #[tokio::test]
    async fn test_abandonment_stops_polling_without_transition() {
        let book = Arc::new(MockOrderBookApi::quoting(U256::from(1_000_000u64), 6));
        let solver = solver(book.clone(), Arc::new(MockSigner::signing()))
            .with_poll_interval(Duration::from_millis(20))
            .with_max_polls(1_000);

        let mut tracked = IntentOrder::new(UnsignedOrder {
            chain_id: 1,
            sell_token: addr(0x22),
            buy_token: addr(0x33),
            sell_amount: U256::from(1_000u64),
            buy_amount: U256::from(990u64),
            receiver: addr(0x11),
            valid_to: u64::MAX,
        });
        tracked.order_id = Some("order-1".to_string());
        tracked.advance(OrderStatus::Submitted).unwrap();

        // Abandon mid-poll by dropping the future.
        let abandoned = tokio::time::timeout(
            Duration::from_millis(70),
            solver.poll_until_terminal(&mut tracked),
        )
        .await;
        assert!(abandoned.is_err());

        let polls_at_abandon = book.status_calls();
        tokio::time::sleep(Duration::from_millis(100)).await;

        // No further polls were scheduled and no transition happened.
        assert_eq!(book.status_calls(), polls_at_abandon);
        assert_eq!(tracked.status(), OrderStatus::Submitted);
    }

    #[tokio::test]
    async fn test_status_fetch_failures_consume_budget() {
        let book = Arc::new(MockOrderBookApi::quoting(U256::from(1_000_000u64), 6));
        book.set_fail_status_fetch(true);
        let solver = solver(book.clone(), Arc::new(MockSigner::signing()))
            .with_max_polls(3);

        solver.init(&request()).await.unwrap();
        let err = solver.execute_deposit(&request()).await.unwrap_err();
        assert!(matches!(err, SolveError::OrderTimeout { polls: 3 }));
    }
}
