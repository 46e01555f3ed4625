use thiserror::Error;
use yield_engine_ratelimit::GatewayError;
use yield_engine_types::{OrderStatus, RequestError};

/// Normalized failure taxonomy for solver operations. Venue-specific errors
/// are mapped onto these kinds at the solver boundary; no raw transport or
/// contract error crosses into calling code.
#[derive(Debug, Error)]
pub enum SolveError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no route for the requested pair")]
    NoRoute,

    #[error("quote failed: {0}")]
    QuoteError(String),

    #[error("quote is stale; refresh before executing")]
    StaleQuote,

    #[error("allowance insufficient: needed {needed}, available {available}")]
    AllowanceInsufficient { needed: String, available: String },

    #[error("approval reverted: {0}")]
    ApprovalReverted(String),

    #[error("execution reverted: {0}")]
    ExecutionReverted(String),

    #[error("no signer connected")]
    NoSigner,

    #[error("signature rejected by signer")]
    SignatureRejected,

    #[error("order reached terminal status {status:?} without a fill")]
    OrderCancelledOrExpired { status: OrderStatus },

    #[error("order polling exhausted after {polls} checks")]
    OrderTimeout { polls: u32 },

    #[error("read gateway saturated for chain {chain_id}")]
    RateLimited { chain_id: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

/// Coarse error classification surfaced to status displays.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidRequest,
    NoRoute,
    QuoteError,
    StaleQuote,
    AllowanceInsufficient,
    ApprovalReverted,
    ExecutionReverted,
    NoSigner,
    SignatureRejected,
    OrderCancelledOrExpired,
    OrderTimeout,
    RateLimited,
    Internal,
}

impl SolveError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SolveError::InvalidRequest(_) => ErrorKind::InvalidRequest,
            SolveError::NoRoute => ErrorKind::NoRoute,
            SolveError::QuoteError(_) => ErrorKind::QuoteError,
            SolveError::StaleQuote => ErrorKind::StaleQuote,
            SolveError::AllowanceInsufficient { .. } => ErrorKind::AllowanceInsufficient,
            SolveError::ApprovalReverted(_) => ErrorKind::ApprovalReverted,
            SolveError::ExecutionReverted(_) => ErrorKind::ExecutionReverted,
            SolveError::NoSigner => ErrorKind::NoSigner,
            SolveError::SignatureRejected => ErrorKind::SignatureRejected,
            SolveError::OrderCancelledOrExpired { .. } => ErrorKind::OrderCancelledOrExpired,
            SolveError::OrderTimeout { .. } => ErrorKind::OrderTimeout,
            SolveError::RateLimited { .. } => ErrorKind::RateLimited,
            SolveError::Internal(_) => ErrorKind::Internal,
        }
    }
}

impl From<RequestError> for SolveError {
    fn from(err: RequestError) -> Self {
        SolveError::InvalidRequest(err.to_string())
    }
}

impl From<GatewayError> for SolveError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Saturated { chain_id } | GatewayError::InvalidConfig { chain_id } => {
                SolveError::RateLimited { chain_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_error_maps_to_invalid_request() {
        let err: SolveError = RequestError::ZeroAmount.into();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_gateway_error_maps_to_rate_limited() {
        let err: SolveError = GatewayError::Saturated { chain_id: 137 }.into();
        assert!(matches!(err, SolveError::RateLimited { chain_id: 137 }));
    }
}
