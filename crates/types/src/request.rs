use alloy_primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

/// Sentinel address venues use for the chain's native asset.
pub const NATIVE_TOKEN: Address = address!("EeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE");

/// Which side of the vault the user is moving funds across.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Deposit,
    Withdraw,
}

/// Input/output token pair, the cache key for quotes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenPair {
    pub input: Address,
    pub output: Address,
}

/// One user action, constructed once and reused identically for quote,
/// approval, and execution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub chain_id: u64,

    /// Destination chain for cross-chain routes; same-chain when absent.
    pub dest_chain_id: Option<u64>,

    /// The account funds move from (and receipts accrue to).
    pub from: Address,

    pub input_token: Address,
    pub output_token: Address,

    /// Input amount in the input token's base units.
    pub amount: U256,

    pub direction: Direction,

    /// Optional migrator contract for vault-to-vault moves.
    pub migrator: Option<Address>,

    /// Optional staking pool the deposited shares are forwarded to.
    pub staking_pool: Option<Address>,
}

impl ExecutionRequest {
    pub fn builder() -> ExecutionRequestBuilder {
        ExecutionRequestBuilder::default()
    }

    pub fn pair(&self) -> TokenPair {
        TokenPair {
            input: self.input_token,
            output: self.output_token,
        }
    }

    pub fn is_cross_chain(&self) -> bool {
        self.dest_chain_id.is_some_and(|dest| dest != self.chain_id)
    }

    /// Rejects zero addresses and a zero amount before any network call.
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.from == Address::ZERO {
            return Err(RequestError::ZeroAddress { field: "from" });
        }
        if self.input_token == Address::ZERO {
            return Err(RequestError::ZeroAddress {
                field: "input_token",
            });
        }
        if self.output_token == Address::ZERO {
            return Err(RequestError::ZeroAddress {
                field: "output_token",
            });
        }
        if self.amount.is_zero() {
            return Err(RequestError::ZeroAmount);
        }
        Ok(())
    }
}

/// Builder for constructing requests
#[derive(Default)]
pub struct ExecutionRequestBuilder {
    chain_id: u64,
    dest_chain_id: Option<u64>,
    from: Option<Address>,
    input_token: Option<Address>,
    output_token: Option<Address>,
    amount: U256,
    direction: Option<Direction>,
    migrator: Option<Address>,
    staking_pool: Option<Address>,
}

impl ExecutionRequestBuilder {
    pub fn chain_id(mut self, chain_id: u64) -> Self {
        self.chain_id = chain_id;
        self
    }

    pub fn dest_chain_id(mut self, dest_chain_id: u64) -> Self {
        self.dest_chain_id = Some(dest_chain_id);
        self
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn input_token(mut self, token: Address) -> Self {
        self.input_token = Some(token);
        self
    }

    pub fn output_token(mut self, token: Address) -> Self {
        self.output_token = Some(token);
        self
    }

    pub fn amount(mut self, amount: U256) -> Self {
        self.amount = amount;
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    pub fn migrator(mut self, migrator: Address) -> Self {
        self.migrator = Some(migrator);
        self
    }

    pub fn staking_pool(mut self, staking_pool: Address) -> Self {
        self.staking_pool = Some(staking_pool);
        self
    }

    /// Build and validate the request.
    pub fn build(self) -> Result<ExecutionRequest, RequestError> {
        let request = ExecutionRequest {
            chain_id: self.chain_id,
            dest_chain_id: self.dest_chain_id,
            from: self.from.ok_or(RequestError::MissingField { field: "from" })?,
            input_token: self.input_token.ok_or(RequestError::MissingField {
                field: "input_token",
            })?,
            output_token: self.output_token.ok_or(RequestError::MissingField {
                field: "output_token",
            })?,
            amount: self.amount,
            direction: self.direction.ok_or(RequestError::MissingField {
                field: "direction",
            })?,
            migrator: self.migrator,
            staking_pool: self.staking_pool,
        };
        request.validate()?;
        Ok(request)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("missing field {field}")]
    MissingField { field: &'static str },

    #[error("zero address in field {field}")]
    ZeroAddress { field: &'static str },

    #[error("zero input amount")]
    ZeroAmount,
}
