use alloy_primitives::{Address, Bytes, U256};
use serde::{Deserialize, Serialize};

/// An off-chain order ready to be signed: sell `sell_amount` of `sell_token`
/// for at least `buy_amount` of `buy_token`, valid until `valid_to`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedOrder {
    pub chain_id: u64,
    pub sell_token: Address,
    pub buy_token: Address,
    pub sell_amount: U256,
    pub buy_amount: U256,
    pub receiver: Address,
    /// Unix timestamp after which the order book discards the order.
    pub valid_to: u64,
}

/// Lifecycle of an intent order. Status only advances forward; terminal
/// states never regress.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Built locally, not yet signed or posted.
    Created,

    /// Posted to the order book, awaiting a fill.
    Submitted,

    /// Filled on-chain by the solver network.
    Fulfilled,

    /// Cancelled before a fill.
    Cancelled,

    /// Validity window elapsed on the order book.
    Expired,

    /// Local polling budget exhausted without a terminal status.
    TimedOut,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Fulfilled
                | OrderStatus::Cancelled
                | OrderStatus::Expired
                | OrderStatus::TimedOut
        )
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum OrderTransitionError {
    #[error("invalid order transition: {from:?} -> {to:?}")]
    Invalid { from: OrderStatus, to: OrderStatus },
}

/// A tracked intent order. Write-once apart from `status`.
#[derive(Clone, Debug)]
pub struct IntentOrder {
    pub order: UnsignedOrder,
    pub signature: Option<Bytes>,
    pub order_id: Option<String>,
    status: OrderStatus,
}

impl IntentOrder {
    pub fn new(order: UnsignedOrder) -> Self {
        Self {
            order,
            signature: None,
            order_id: None,
            status: OrderStatus::Created,
        }
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Advance the lifecycle. Submission requires a created order; terminal
    /// outcomes require a submitted one.
    pub fn advance(&mut self, next: OrderStatus) -> Result<(), OrderTransitionError> {
        let allowed = match (self.status, next) {
            (OrderStatus::Created, OrderStatus::Submitted) => true,
            (OrderStatus::Submitted, to) => to.is_terminal(),
            _ => false,
        };
        if !allowed {
            return Err(OrderTransitionError::Invalid {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order() -> UnsignedOrder {
        UnsignedOrder {
            chain_id: 1,
            sell_token: Address::repeat_byte(0x01),
            buy_token: Address::repeat_byte(0x02),
            sell_amount: U256::from(1_000u64),
            buy_amount: U256::from(990u64),
            receiver: Address::repeat_byte(0x03),
            valid_to: 1_700_000_000,
        }
    }

    #[test]
    fn test_lifecycle_happy_path() {
        let mut tracked = IntentOrder::new(order());
        assert_eq!(tracked.status(), OrderStatus::Created);

        tracked.advance(OrderStatus::Submitted).unwrap();
        tracked.advance(OrderStatus::Fulfilled).unwrap();
        assert!(tracked.status().is_terminal());
    }

    #[test]
    fn test_cannot_skip_submission() {
        let mut tracked = IntentOrder::new(order());
        assert_eq!(
            tracked.advance(OrderStatus::Fulfilled),
            Err(OrderTransitionError::Invalid {
                from: OrderStatus::Created,
                to: OrderStatus::Fulfilled,
            })
        );
        assert_eq!(tracked.status(), OrderStatus::Created);
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        for terminal in [
            OrderStatus::Fulfilled,
            OrderStatus::Cancelled,
            OrderStatus::Expired,
            OrderStatus::TimedOut,
        ] {
            let mut tracked = IntentOrder::new(order());
            tracked.advance(OrderStatus::Submitted).unwrap();
            tracked.advance(terminal).unwrap();

            for next in [
                OrderStatus::Submitted,
                OrderStatus::Fulfilled,
                OrderStatus::Cancelled,
                OrderStatus::Expired,
                OrderStatus::TimedOut,
            ] {
                assert!(tracked.advance(next).is_err());
                assert_eq!(tracked.status(), terminal);
            }
        }
    }

    #[test]
    fn test_no_backward_transition() {
        let mut tracked = IntentOrder::new(order());
        tracked.advance(OrderStatus::Submitted).unwrap();
        assert!(tracked.advance(OrderStatus::Submitted).is_err());
    }
}
