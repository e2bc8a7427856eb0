//! Currency amounts in integer minor units.

use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Number of decimal places of the minor unit (cents).
pub const MINOR_UNIT_SCALE: u32 = 2;

/// A signed amount of money, stored as a count of minor units.
///
/// All ledger arithmetic happens on the integer count, so sums are exact.
/// On the wire an amount is a decimal with at most two places; it is written
/// back as a decimal string (`"3.34"`).
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Money(i64);

impl ValueObject for Money {}

impl Money {
    pub const ZERO: Money = Money(0);

    /// Largest magnitude accepted from a single request (ten billion units).
    pub const MAX_INPUT: Money = Money(1_000_000_000_000);

    pub const fn from_minor(units: i64) -> Self {
        Self(units)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Convert a decimal amount, rejecting sub-cent precision and out of range values.
    pub fn from_decimal(amount: Decimal) -> DomainResult<Self> {
        let scaled = amount
            .checked_mul(Decimal::from(10_i64.pow(MINOR_UNIT_SCALE)))
            .ok_or_else(|| DomainError::invalid_input("amount is out of range"))?;
        if !scaled.fract().is_zero() {
            return Err(DomainError::invalid_input(format!(
                "amount {amount} has more than {MINOR_UNIT_SCALE} decimal places"
            )));
        }
        let units = scaled
            .to_i64()
            .ok_or_else(|| DomainError::invalid_input("amount is out of range"))?;
        let money = Self(units);
        if money.abs() > Self::MAX_INPUT {
            return Err(DomainError::invalid_input(format!(
                "amount must not exceed {}",
                Self::MAX_INPUT
            )));
        }
        Ok(money)
    }

    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, MINOR_UNIT_SCALE)
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    pub fn checked_add(self, rhs: Money) -> Option<Money> {
        self.0.checked_add(rhs.0).map(Self)
    }

    pub fn checked_sub(self, rhs: Money) -> Option<Money> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.to_decimal(), f)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.0 += rhs.0;
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        self.0 -= rhs.0;
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl core::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, |acc, m| acc + m)
    }
}

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.to_decimal())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let amount = <Decimal as Deserialize>::deserialize(deserializer)?;
        Money::from_decimal(amount).map_err(serde::de::Error::custom)
    }
}
