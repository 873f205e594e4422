//! Money representation - scaled integer amounts
//!
//! All balances and amounts are held internally as u64 **micro-units**
//! (6 decimal places). Conversion to and from the IEEE-754 doubles crossing
//! the HTTP and RPC boundaries goes through `rust_decimal`, so `100.00`
//! maps to exactly `100_000_000` micro-units and replica comparison is an
//! exact integer equality.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places carried by a [`ScaledAmount`]
pub const AMOUNT_SCALE: u32 = 6;

/// Multiplier between whole units and micro-units (10^AMOUNT_SCALE)
pub const AMOUNT_UNIT: u64 = 1_000_000;

/// A non-negative monetary amount in micro-units.
///
/// # Invariants (enforced by the constructors):
/// 1. Never negative (u64 representation)
/// 2. At most 6 decimal places of precision
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScaledAmount(u64);

impl ScaledAmount {
    pub const ZERO: ScaledAmount = ScaledAmount(0);

    /// Wrap a raw micro-unit count.
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Parse a boundary `f64` into micro-units.
    ///
    /// Returns `None` for NaN, infinities, negative values, and values that
    /// overflow the u64 micro-unit range. Fractions beyond 6 decimal places
    /// are rounded half-up, so `0.1 + 0.2` noise does not leak into the
    /// ledger.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let d = Decimal::from_f64(value)?;
        let micros = (d * Decimal::from(AMOUNT_UNIT))
            .round_dp(0)
            .to_u64()?;
        Some(Self(micros))
    }

    /// Render as the boundary `f64`.
    pub fn to_f64(self) -> f64 {
        (Decimal::from(self.0) / Decimal::from(AMOUNT_UNIT))
            .to_f64()
            .unwrap_or(0.0)
    }

    /// Raw micro-unit count.
    #[inline(always)]
    pub const fn micros(self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Credit, failing on overflow.
    pub fn checked_add(self, other: ScaledAmount) -> Option<ScaledAmount> {
        self.0.checked_add(other.0).map(ScaledAmount)
    }

    /// Debit, failing when the balance would go negative.
    pub fn checked_sub(self, other: ScaledAmount) -> Option<ScaledAmount> {
        self.0.checked_sub(other.0).map(ScaledAmount)
    }
}

impl fmt::Display for ScaledAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let d = Decimal::from(self.0) / Decimal::from(AMOUNT_UNIT);
        write!(f, "{}", d.normalize())
    }
}

// ============================================================
// Unit Tests
// ============================================================

#[cfg(test)]
mod tests {
    use super::*;

    // --------------------------------------------------------
    // Test 1: Boundary round-trip for typical amounts
    // --------------------------------------------------------
    #[test]
    fn test_from_f64_round_trip() {
        let cases = [
            (100.00, 100_000_000u64),
            (0.5, 500_000),
            (10.0, 10_000_000),
            (0.000001, 1),
            (1.0, 1_000_000),
        ];
        for (input, micros) in cases {
            let a = ScaledAmount::from_f64(input).unwrap();
            assert_eq!(a.micros(), micros, "input {}", input);
            assert_eq!(a.to_f64(), input);
        }
    }

    // --------------------------------------------------------
    // Test 2: Invalid boundary values rejected
    // --------------------------------------------------------
    #[test]
    fn test_from_f64_rejects_invalid() {
        assert!(ScaledAmount::from_f64(f64::NAN).is_none());
        assert!(ScaledAmount::from_f64(f64::INFINITY).is_none());
        assert!(ScaledAmount::from_f64(f64::NEG_INFINITY).is_none());
        assert!(ScaledAmount::from_f64(-0.01).is_none());
    }

    // --------------------------------------------------------
    // Test 3: Sub-micro fractions are rounded, not truncated
    // --------------------------------------------------------
    #[test]
    fn test_from_f64_rounds_sub_micro_noise() {
        // 0.1 + 0.2 in binary is 0.30000000000000004
        let a = ScaledAmount::from_f64(0.1 + 0.2).unwrap();
        assert_eq!(a.micros(), 300_000);
    }

    // --------------------------------------------------------
    // Test 4: Checked arithmetic
    // --------------------------------------------------------
    #[test]
    fn test_checked_arithmetic() {
        let a = ScaledAmount::from_micros(100);
        let b = ScaledAmount::from_micros(30);

        assert_eq!(a.checked_add(b), Some(ScaledAmount::from_micros(130)));
        assert_eq!(a.checked_sub(b), Some(ScaledAmount::from_micros(70)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(ScaledAmount::from_micros(u64::MAX).checked_add(b), None);
    }

    // --------------------------------------------------------
    // Test 5: Display normalizes trailing zeros
    // --------------------------------------------------------
    #[test]
    fn test_display() {
        assert_eq!(ScaledAmount::from_micros(100_000_000).to_string(), "100");
        assert_eq!(ScaledAmount::from_micros(500_000).to_string(), "0.5");
        assert_eq!(ScaledAmount::ZERO.to_string(), "0");
    }
}
