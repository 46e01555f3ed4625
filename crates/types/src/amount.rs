use alloy_primitives::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Significant digits a `Decimal` mantissa can carry.
const DECIMAL_MAX_DIGITS: usize = 28;

/// A token amount carried as the raw base-unit integer together with its
/// human-readable decimal view.
///
/// Invariant: `normalized == raw / 10^decimals`, truncated toward zero once
/// the value exceeds `Decimal` precision. Immutable once constructed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedAmount {
    raw: U256,
    decimals: u8,
    normalized: Decimal,
}

impl NormalizedAmount {
    pub fn from_raw(raw: U256, decimals: u8) -> Self {
        let normalized = normalize(raw, decimals);
        Self {
            raw,
            decimals,
            normalized,
        }
    }

    pub fn zero(decimals: u8) -> Self {
        Self::from_raw(U256::ZERO, decimals)
    }

    pub fn raw(&self) -> U256 {
        self.raw
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    pub fn normalized(&self) -> Decimal {
        self.normalized
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    /// Re-express the same quantity under a different decimal scale, 1:1.
    ///
    /// Scaling down truncates base units below the coarser resolution.
    pub fn rescaled(&self, decimals: u8) -> Self {
        if decimals == self.decimals {
            return self.clone();
        }
        let raw = if decimals > self.decimals {
            self.raw * U256::from(10u64).pow(U256::from(decimals - self.decimals))
        } else {
            self.raw / U256::from(10u64).pow(U256::from(self.decimals - decimals))
        };
        Self::from_raw(raw, decimals)
    }
}

impl fmt::Display for NormalizedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.normalized)
    }
}

/// Exact decimal-point insertion over the base-10 digit string; no float
/// conversion anywhere in the path.
fn normalize(raw: U256, decimals: u8) -> Decimal {
    let digits = raw.to_string();
    let scale = decimals as usize;
    let (int_part, frac_part) = if digits.len() > scale {
        let split = digits.len() - scale;
        (digits[..split].to_string(), digits[split..].to_string())
    } else {
        ("0".to_string(), format!("{:0>width$}", digits, width = scale))
    };

    let int_digits = if int_part == "0" { 0 } else { int_part.len() };
    if int_digits > DECIMAL_MAX_DIGITS {
        return Decimal::MAX;
    }

    let frac_keep = frac_part.len().min(DECIMAL_MAX_DIGITS - int_digits);
    let mut text = int_part;
    if frac_keep > 0 {
        text.push('.');
        text.push_str(&frac_part[..frac_keep]);
    }
    Decimal::from_str(&text).unwrap_or(Decimal::MAX).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_matches_raw_over_scale() {
        let amount = NormalizedAmount::from_raw(U256::from(1_500_000u64), 6);
        assert_eq!(amount.normalized(), Decimal::from_str("1.5").unwrap());
        assert_eq!(amount.raw(), U256::from(1_500_000u64));
        assert_eq!(amount.decimals(), 6);
    }

    #[test]
    fn test_sub_unit_amount() {
        let amount = NormalizedAmount::from_raw(U256::from(42u64), 6);
        assert_eq!(amount.normalized(), Decimal::from_str("0.000042").unwrap());
    }

    #[test]
    fn test_zero() {
        let amount = NormalizedAmount::zero(18);
        assert!(amount.is_zero());
        assert_eq!(amount.normalized(), Decimal::ZERO);
    }

    #[test]
    fn test_zero_decimals() {
        let amount = NormalizedAmount::from_raw(U256::from(7u64), 0);
        assert_eq!(amount.normalized(), Decimal::from(7));
    }

    #[test]
    fn test_eighteen_decimal_unit() {
        let one = U256::from(10u64).pow(U256::from(18u64));
        let amount = NormalizedAmount::from_raw(one, 18);
        assert_eq!(amount.normalized(), Decimal::ONE);
    }

    #[test]
    fn test_rescale_up_preserves_value() {
        let six = NormalizedAmount::from_raw(U256::from(1_000_000u64), 6);
        let eighteen = six.rescaled(18);
        assert_eq!(eighteen.decimals(), 18);
        assert_eq!(eighteen.raw(), U256::from(10u64).pow(U256::from(18u64)));
        assert_eq!(eighteen.normalized(), six.normalized());
    }

    #[test]
    fn test_rescale_down_truncates() {
        let eighteen =
            NormalizedAmount::from_raw(U256::from(1_500_000_000_000_000_001u64), 18);
        let six = eighteen.rescaled(6);
        assert_eq!(six.raw(), U256::from(1_500_000u64));
    }

    #[test]
    fn test_rescale_same_scale_is_identity() {
        let amount = NormalizedAmount::from_raw(U256::from(123u64), 8);
        assert_eq!(amount.rescaled(8), amount);
    }

    #[test]
    fn test_oversized_value_saturates_normalized_view() {
        let amount = NormalizedAmount::from_raw(U256::MAX, 0);
        assert_eq!(amount.normalized(), Decimal::MAX);
        // The raw side is untouched.
        assert_eq!(amount.raw(), U256::MAX);
    }

    #[test]
    fn test_display_uses_normalized_form() {
        let amount = NormalizedAmount::from_raw(U256::from(2_500_000u64), 6);
        assert_eq!(amount.to_string(), "2.5");
    }
}
