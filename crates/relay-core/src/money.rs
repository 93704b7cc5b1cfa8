//! # Money Module
//!
//! Provides the `Money` type for amounts carried through the relay.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Summing installments as floats:                                        │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  An invoice total must equal the sum of its due-dates EXACTLY,         │
//! │  otherwise the consumer rejects the import.                            │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    10000 + 15000 = 25000 (100.00 + 150.00 = 250.00)                     │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The buffer tables store every amount in minor units (`*_cents` columns),
//! independent of currency.
//!
//! ## Usage
//! ```rust
//! use relay_core::money::Money;
//!
//! let first = Money::from_cents(10000);  // 100.00
//! let second = Money::from_cents(15000); // 150.00
//!
//! let total: Money = [first, second].into_iter().sum();
//! assert_eq!(total.cents(), 25000);
//! assert_eq!(total.to_string(), "250.00");
//! ```

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub};
use ts_rs::TS;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: credit notes arrive from the ERP as negative amounts
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **No currency**: a transfer unit carries its currency code separately
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use relay_core::money::Money;
    ///
    /// let amount = Money::from_cents(1099); // 10.99
    /// assert_eq!(amount.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is negative (credit note).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Adds two amounts, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }
}

// =============================================================================
// Wire Format
// =============================================================================

/// Serializes minor units as a decimal string (`25000` → `"250.00"`).
///
/// Used with `#[serde(serialize_with = ...)]` on `*_cents` fields so the
/// consumer receives exact amounts in major units.
pub fn serialize_decimal<S: Serializer>(cents: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(&Money::from_cents(*cents))
}

/// Like [`serialize_decimal`], keeping `None` as `null`.
pub fn serialize_optional_decimal<S: Serializer>(
    cents: &Option<i64>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match cents {
        Some(cents) => serialize_decimal(cents, serializer),
        None => serializer.serialize_none(),
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Plain decimal rendering (`-12.50`), used in log lines.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Saturates at the i64 bounds instead of wrapping or panicking.
impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

/// Saturates at the i64 bounds instead of wrapping or panicking.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
