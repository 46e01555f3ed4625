use alloy_primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::NormalizedAmount;

/// Basis-point denominator used for all slippage math.
pub const BPS_DENOMINATOR: u16 = 10_000;

/// Settlement venue a quote was produced for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Vanilla,
    Router,
    Intent,
}

/// An expected-output estimate for a given input, venue, and amount.
///
/// `min_out` never exceeds `expected_out`; a quote older than its venue's
/// freshness window must be refreshed before execution.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub venue: Venue,
    pub expected_out: NormalizedAmount,
    pub min_out: NormalizedAmount,
    pub slippage_bps: u16,
    pub obtained_at: DateTime<Utc>,
}

impl Quote {
    pub fn new(
        venue: Venue,
        expected_out: NormalizedAmount,
        min_out: NormalizedAmount,
        slippage_bps: u16,
    ) -> Self {
        let min_out = if min_out.raw() > expected_out.raw() {
            expected_out.clone()
        } else {
            min_out
        };
        Self {
            venue,
            expected_out,
            min_out,
            slippage_bps,
            obtained_at: Utc::now(),
        }
    }

    pub fn age(&self) -> Duration {
        (Utc::now() - self.obtained_at).to_std().unwrap_or_default()
    }

    pub fn is_fresh(&self, window: Duration) -> bool {
        self.age() <= window
    }
}

/// Slippage-adjusted minimum: `amount * (10000 - bps) / 10000`, integer math
/// on the raw side, rounding down.
pub fn apply_slippage_bps(amount: &NormalizedAmount, bps: u16) -> NormalizedAmount {
    let bps = bps.min(BPS_DENOMINATOR);
    let raw = amount.raw() * U256::from(BPS_DENOMINATOR - bps) / U256::from(BPS_DENOMINATOR);
    NormalizedAmount::from_raw(raw, amount.decimals())
}
