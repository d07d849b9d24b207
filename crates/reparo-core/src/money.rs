//! # Money Module
//!
//! Integer Rupiah amounts for service quotes, part prices and final costs.
//!
//! ## Why Whole Rupiah?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  The Rupiah has no minor unit in day-to-day commerce.                   │
//! │                                                                         │
//! │   Stored:     250000 (i64)                                              │
//! │   Displayed:  "Rp 250.000"   ← dot as thousands separator               │
//! │                                                                         │
//! │  Integer math keeps part subtotals exact:                               │
//! │   2 × Rp 50.000 + 1 × Rp 150.000 = Rp 250.000                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul};

// =============================================================================
// Rupiah Type
// =============================================================================

/// An amount of Indonesian Rupiah, in whole units.
///
/// ## Example
/// ```rust
/// use reparo_core::money::Rupiah;
///
/// let part = Rupiah::new(50_000);
/// let line = part * 2u32;
/// assert_eq!(line.amount(), 100_000);
/// assert_eq!(line.to_string(), "Rp 100.000");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rupiah(i64);

impl Rupiah {
    /// Creates an amount from whole rupiah.
    #[inline]
    pub const fn new(amount: i64) -> Self {
        Rupiah(amount)
    }

    /// Returns the amount in whole rupiah.
    #[inline]
    pub const fn amount(&self) -> i64 {
        self.0
    }

    /// Zero rupiah.
    #[inline]
    pub const fn zero() -> Self {
        Rupiah(0)
    }

    /// Checks if the amount is strictly greater than zero.
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Multiplies a unit price by a quantity, saturating at the i64 range.
    ///
    /// Prices and quantities arrive from outside, so the product is taken in
    /// i128 and clamped instead of wrapping into a bogus negative total.
    #[inline]
    pub fn multiply_quantity(&self, qty: u32) -> Self {
        let wide = self.0 as i128 * qty as i128;
        Rupiah(wide.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Formats as `Rp 1.250.000`, the form used in customer messages.
impl fmt::Display for Rupiah {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }

        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}Rp {}", sign, grouped)
    }
}

impl Default for Rupiah {
    fn default() -> Self {
        Rupiah::zero()
    }
}

/// Saturating, so a subtotal never wraps.
impl Add for Rupiah {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Rupiah(self.0.saturating_add(other.0))
    }
}

impl Mul<u32> for Rupiah {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Rupiah {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Rupiah::zero(), Add::add)
    }
}

impl From<i64> for Rupiah {
    fn from(amount: i64) -> Self {
        Rupiah(amount)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Rupiah::new(0).to_string(), "Rp 0");
        assert_eq!(Rupiah::new(999).to_string(), "Rp 999");
        assert_eq!(Rupiah::new(1_000).to_string(), "Rp 1.000");
        assert_eq!(Rupiah::new(250_000).to_string(), "Rp 250.000");
        assert_eq!(Rupiah::new(1_250_000).to_string(), "Rp 1.250.000");
        assert_eq!(Rupiah::new(-75_500).to_string(), "-Rp 75.500");
    }

    #[test]
    fn test_sum_of_line_totals() {
        let lines = [Rupiah::new(50_000) * 2, Rupiah::new(150_000) * 1];
        let subtotal: Rupiah = lines.into_iter().sum();
        assert_eq!(subtotal, Rupiah::new(250_000));
    }

    #[test]
    fn test_extreme_line_totals_saturate() {
        let line = Rupiah::new(9_000_000_000) * 4_000_000_000u32;
        assert_eq!(line, Rupiah::new(i64::MAX));

        let subtotal: Rupiah = [line, Rupiah::new(1)].into_iter().sum();
        assert_eq!(subtotal, Rupiah::new(i64::MAX));

        let refund = Rupiah::new(-9_000_000_000) * u32::MAX;
        assert_eq!(refund, Rupiah::new(i64::MIN));
        assert_eq!((refund + Rupiah::new(-1)).amount(), i64::MIN);
        assert!(refund.to_string().starts_with("-Rp 9.223.372"));
    }

    #[test]
    fn test_is_positive() {
        assert!(Rupiah::new(1).is_positive());
        assert!(!Rupiah::zero().is_positive());
        assert!(!Rupiah::new(-10).is_positive());
    }

    #[test]
    fn test_serde_is_a_bare_number() {
        let json = serde_json::to_string(&Rupiah::new(125_000)).unwrap();
        assert_eq!(json, "125000");
        let back: Rupiah = serde_json::from_str("125000").unwrap();
        assert_eq!(back.amount(), 125_000);
    }
}
