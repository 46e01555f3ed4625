//! Mock collaborators for tests. Exported so the orchestrator crate and the
//! workspace integration suite can reuse them.

use alloy_primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use yield_engine_types::UnsignedOrder;

use crate::{
    ApprovalResponse, ChainClient, ChainError, EstimateRequest, EstimateResponse, OrderBookApi,
    OrderBookError, OrderBookStatus, OrderQuote, OrderQuoteRequest, RawTransaction, Signer,
    SignerError, TokenRegistry, TransactionResponse, TxReceipt, ZapApi, ZapApiError,
};

fn mined_receipt() -> TxReceipt {
    TxReceipt {
        tx_hash: B256::repeat_byte(0xab),
        status: 1,
    }
}

fn reverted_receipt() -> TxReceipt {
    TxReceipt {
        tx_hash: B256::repeat_byte(0xba),
        status: 0,
    }
}

/// In-memory chain client tracking balances, allowances, and call ordering.
pub struct MockChainClient {
    allowances: Mutex<HashMap<(u64, Address, Address, Address), U256>>,
    native_balances: Mutex<HashMap<(u64, Address), U256>>,
    gas_price: Mutex<U256>,
    revert_approvals: AtomicBool,
    revert_execution: AtomicBool,
    allowance_reads: AtomicU32,
    approve_count: AtomicU32,
    deposit_count: AtomicU32,
    withdraw_count: AtomicU32,
    send_count: AtomicU32,
    last_approved_spender: Mutex<Option<Address>>,
    last_sent_transaction: Mutex<Option<RawTransaction>>,
    call_log: Mutex<Vec<String>>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self {
            allowances: Mutex::new(HashMap::new()),
            native_balances: Mutex::new(HashMap::new()),
            gas_price: Mutex::new(U256::ZERO),
            revert_approvals: AtomicBool::new(false),
            revert_execution: AtomicBool::new(false),
            allowance_reads: AtomicU32::new(0),
            approve_count: AtomicU32::new(0),
            deposit_count: AtomicU32::new(0),
            withdraw_count: AtomicU32::new(0),
            send_count: AtomicU32::new(0),
            last_approved_spender: Mutex::new(None),
            last_sent_transaction: Mutex::new(None),
            call_log: Mutex::new(Vec::new()),
        }
    }

    pub fn set_allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) {
        self.allowances
            .lock()
            .unwrap()
            .insert((chain_id, token, owner, spender), amount);
    }

    pub fn set_native_balance(&self, chain_id: u64, owner: Address, balance: U256) {
        self.native_balances
            .lock()
            .unwrap()
            .insert((chain_id, owner), balance);
    }

    pub fn set_gas_price(&self, gas_price: U256) {
        *self.gas_price.lock().unwrap() = gas_price;
    }

    pub fn set_revert_approvals(&self, revert: bool) {
        self.revert_approvals.store(revert, Ordering::SeqCst);
    }

    pub fn set_revert_execution(&self, revert: bool) {
        self.revert_execution.store(revert, Ordering::SeqCst);
    }

    pub fn allowance_reads(&self) -> u32 {
        self.allowance_reads.load(Ordering::SeqCst)
    }

    pub fn approve_calls(&self) -> u32 {
        self.approve_count.load(Ordering::SeqCst)
    }

    pub fn deposit_calls(&self) -> u32 {
        self.deposit_count.load(Ordering::SeqCst)
    }

    pub fn withdraw_calls(&self) -> u32 {
        self.withdraw_count.load(Ordering::SeqCst)
    }

    pub fn send_calls(&self) -> u32 {
        self.send_count.load(Ordering::SeqCst)
    }

    pub fn last_approved_spender(&self) -> Option<Address> {
        *self.last_approved_spender.lock().unwrap()
    }

    pub fn last_sent_transaction(&self) -> Option<RawTransaction> {
        self.last_sent_transaction.lock().unwrap().clone()
    }

    /// Ordered names of state-changing calls, for sequencing assertions.
    pub fn call_log(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    fn log(&self, entry: &str) {
        self.call_log.lock().unwrap().push(entry.to_string());
    }
}

impl Default for MockChainClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn allowance(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, ChainError> {
        self.allowance_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .allowances
            .lock()
            .unwrap()
            .get(&(chain_id, token, owner, spender))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn approve(
        &self,
        chain_id: u64,
        token: Address,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<TxReceipt, ChainError> {
        self.approve_count.fetch_add(1, Ordering::SeqCst);
        self.log("approve");
        *self.last_approved_spender.lock().unwrap() = Some(spender);

        if self.revert_approvals.load(Ordering::SeqCst) {
            return Ok(reverted_receipt());
        }

        self.allowances
            .lock()
            .unwrap()
            .insert((chain_id, token, owner, spender), amount);
        Ok(mined_receipt())
    }

    async fn vault_deposit(
        &self,
        _chain_id: u64,
        _vault: Address,
        _from: Address,
        _amount: U256,
    ) -> Result<TxReceipt, ChainError> {
        self.deposit_count.fetch_add(1, Ordering::SeqCst);
        self.log("vault_deposit");
        if self.revert_execution.load(Ordering::SeqCst) {
            return Ok(reverted_receipt());
        }
        Ok(mined_receipt())
    }

    async fn vault_withdraw(
        &self,
        _chain_id: u64,
        _vault: Address,
        _from: Address,
        _amount: U256,
    ) -> Result<TxReceipt, ChainError> {
        self.withdraw_count.fetch_add(1, Ordering::SeqCst);
        self.log("vault_withdraw");
        if self.revert_execution.load(Ordering::SeqCst) {
            return Ok(reverted_receipt());
        }
        Ok(mined_receipt())
    }

    async fn send_transaction(
        &self,
        _chain_id: u64,
        _from: Address,
        tx: RawTransaction,
    ) -> Result<TxReceipt, ChainError> {
        self.send_count.fetch_add(1, Ordering::SeqCst);
        self.log("send_transaction");
        *self.last_sent_transaction.lock().unwrap() = Some(tx);
        if self.revert_execution.load(Ordering::SeqCst) {
            return Ok(reverted_receipt());
        }
        Ok(mined_receipt())
    }

    async fn native_balance(&self, chain_id: u64, owner: Address) -> Result<U256, ChainError> {
        Ok(self
            .native_balances
            .lock()
            .unwrap()
            .get(&(chain_id, owner))
            .copied()
            .unwrap_or(U256::ZERO))
    }

    async fn gas_price(&self, _chain_id: u64) -> Result<U256, ChainError> {
        Ok(*self.gas_price.lock().unwrap())
    }
}

enum SignerMode {
    Signing,
    Unavailable,
    Rejecting,
}

/// Wallet stub with three behaviors: signs, is absent, or refuses.
pub struct MockSigner {
    mode: SignerMode,
    sign_count: AtomicU32,
}

impl MockSigner {
    pub fn signing() -> Self {
        Self {
            mode: SignerMode::Signing,
            sign_count: AtomicU32::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            mode: SignerMode::Unavailable,
            sign_count: AtomicU32::new(0),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            mode: SignerMode::Rejecting,
            sign_count: AtomicU32::new(0),
        }
    }

    pub fn sign_calls(&self) -> u32 {
        self.sign_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for MockSigner {
    fn address(&self) -> Address {
        Address::repeat_byte(0x51)
    }

    async fn sign_order(&self, _order: &UnsignedOrder) -> Result<Bytes, SignerError> {
        self.sign_count.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            SignerMode::Signing => Ok(Bytes::from(vec![0x51u8; 65])),
            SignerMode::Unavailable => Err(SignerError::Unavailable),
            SignerMode::Rejecting => Err(SignerError::Rejected),
        }
    }
}

/// Token metadata stub; unknown tokens default to 18 decimals.
pub struct MockTokenRegistry {
    decimals: Mutex<HashMap<(u64, Address), u8>>,
}

impl MockTokenRegistry {
    pub fn new() -> Self {
        Self {
            decimals: Mutex::new(HashMap::new()),
        }
    }

    pub fn set_decimals(&self, chain_id: u64, token: Address, decimals: u8) {
        self.decimals
            .lock()
            .unwrap()
            .insert((chain_id, token), decimals);
    }
}

impl Default for MockTokenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenRegistry for MockTokenRegistry {
    async fn decimals(&self, chain_id: u64, token: Address) -> Result<u8, ChainError> {
        Ok(self
            .decimals
            .lock()
            .unwrap()
            .get(&(chain_id, token))
            .copied()
            .unwrap_or(18))
    }
}

/// Scriptable aggregator API stub.
pub struct MockZapApi {
    output_amount: Mutex<U256>,
    output_decimals: Mutex<u8>,
    min_output: Mutex<Option<U256>>,
    estimate_error: Mutex<Option<String>>,
    spender: Mutex<Address>,
    transaction: Mutex<TransactionResponse>,
    last_estimate_request: Mutex<Option<EstimateRequest>>,
    estimate_calls: AtomicU32,
}

impl MockZapApi {
    /// Stub quoting `output_amount` at `output_decimals` for every estimate.
    pub fn quoting(output_amount: U256, output_decimals: u8) -> Self {
        Self {
            output_amount: Mutex::new(output_amount),
            output_decimals: Mutex::new(output_decimals),
            min_output: Mutex::new(None),
            estimate_error: Mutex::new(None),
            spender: Mutex::new(Address::repeat_byte(0xAA)),
            transaction: Mutex::new(TransactionResponse {
                to: Address::repeat_byte(0xBB),
                data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef]),
                value: U256::ZERO,
                gas_limit: U256::from(200_000u64),
                error: None,
            }),
            last_estimate_request: Mutex::new(None),
            estimate_calls: AtomicU32::new(0),
        }
    }

    pub fn set_min_output(&self, min_output: Option<U256>) {
        *self.min_output.lock().unwrap() = min_output;
    }

    pub fn set_estimate_error(&self, error: &str) {
        *self.estimate_error.lock().unwrap() = Some(error.to_string());
    }

    pub fn set_spender(&self, spender: Address) {
        *self.spender.lock().unwrap() = spender;
    }

    pub fn estimate_calls(&self) -> u32 {
        self.estimate_calls.load(Ordering::SeqCst)
    }

    pub fn last_estimate_request(&self) -> Option<EstimateRequest> {
        self.last_estimate_request.lock().unwrap().clone()
    }

    /// The payload `transaction` currently returns, as a `RawTransaction`.
    pub fn transaction_payload(&self) -> RawTransaction {
        let tx = self.transaction.lock().unwrap();
        RawTransaction {
            to: tx.to,
            data: tx.data.clone(),
            value: tx.value,
            gas_limit: tx.gas_limit,
        }
    }
}

#[async_trait]
impl ZapApi for MockZapApi {
    async fn estimate(
        &self,
        request: &EstimateRequest,
    ) -> Result<EstimateResponse, ZapApiError> {
        self.estimate_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_estimate_request.lock().unwrap() = Some(request.clone());
        Ok(EstimateResponse {
            output_token: request.output_token,
            output_amount: *self.output_amount.lock().unwrap(),
            min_output_amount: *self.min_output.lock().unwrap(),
            output_token_decimals: *self.output_decimals.lock().unwrap(),
            error: self.estimate_error.lock().unwrap().clone(),
        })
    }

    async fn approval(
        &self,
        _request: &EstimateRequest,
    ) -> Result<ApprovalResponse, ZapApiError> {
        Ok(ApprovalResponse {
            should_approve: true,
            spender: Some(*self.spender.lock().unwrap()),
            allowance: Some(U256::ZERO),
            error: None,
        })
    }

    async fn transaction(
        &self,
        _request: &EstimateRequest,
    ) -> Result<TransactionResponse, ZapApiError> {
        Ok(self.transaction.lock().unwrap().clone())
    }
}

/// Scriptable order-book stub. Statuses are served from a queue; an empty
/// queue reports the order as still open.
pub struct MockOrderBookApi {
    buy_amount: Mutex<U256>,
    buy_decimals: Mutex<u8>,
    statuses: Mutex<VecDeque<OrderBookStatus>>,
    fail_status_fetch: AtomicBool,
    fail_submit: AtomicBool,
    submit_count: AtomicU32,
    status_count: AtomicU32,
    last_submitted_order: Mutex<Option<UnsignedOrder>>,
}

impl MockOrderBookApi {
    pub fn quoting(buy_amount: U256, buy_decimals: u8) -> Self {
        Self {
            buy_amount: Mutex::new(buy_amount),
            buy_decimals: Mutex::new(buy_decimals),
            statuses: Mutex::new(VecDeque::new()),
            fail_status_fetch: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            submit_count: AtomicU32::new(0),
            status_count: AtomicU32::new(0),
            last_submitted_order: Mutex::new(None),
        }
    }

    pub fn push_status(&self, status: OrderBookStatus) {
        self.statuses.lock().unwrap().push_back(status);
    }

    pub fn set_fail_status_fetch(&self, fail: bool) {
        self.fail_status_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_submit(&self, fail: bool) {
        self.fail_submit.store(fail, Ordering::SeqCst);
    }

    pub fn submit_calls(&self) -> u32 {
        self.submit_count.load(Ordering::SeqCst)
    }

    pub fn status_calls(&self) -> u32 {
        self.status_count.load(Ordering::SeqCst)
    }

    pub fn last_submitted_order(&self) -> Option<UnsignedOrder> {
        self.last_submitted_order.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderBookApi for MockOrderBookApi {
    async fn quote_order(
        &self,
        request: &OrderQuoteRequest,
    ) -> Result<OrderQuote, OrderBookError> {
        Ok(OrderQuote {
            sell_amount: request.sell_amount,
            buy_amount: *self.buy_amount.lock().unwrap(),
            buy_token_decimals: *self.buy_decimals.lock().unwrap(),
        })
    }

    async fn submit_order(
        &self,
        order: &UnsignedOrder,
        _signature: &Bytes,
    ) -> Result<String, OrderBookError> {
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(OrderBookError::Rejected("submission refused".to_string()));
        }
        let id = self.submit_count.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_submitted_order.lock().unwrap() = Some(order.clone());
        Ok(format!("order-{id}"))
    }

    async fn order_status(&self, _order_id: &str) -> Result<OrderBookStatus, OrderBookError> {
        self.status_count.fetch_add(1, Ordering::SeqCst);
        if self.fail_status_fetch.load(Ordering::SeqCst) {
            return Err(OrderBookError::Http("status endpoint unreachable".to_string()));
        }
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(OrderBookStatus::Open))
    }
}
