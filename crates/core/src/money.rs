//! Monetary amounts as a value object.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

/// Currency code (e.g. "VND", "USD").
///
/// Currencies are opaque strings at this layer; the domain only requires that
/// amounts combined arithmetically share the same currency.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(Cow<'static, str>);

impl Currency {
    pub const VND: Currency = Currency(Cow::Borrowed("VND"));
    pub const USD: Currency = Currency(Cow::Borrowed("USD"));

    pub fn new(code: impl Into<Cow<'static, str>>) -> Self {
        Self(code.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Amount in the smallest currency unit (VND has none, USD uses cents).
///
/// Signed so derived quantities (e.g. remaining budget) can go negative;
/// commands validate non-negativity where the domain requires it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Money {
    pub amount: i64,
    pub currency: Currency,
}

impl ValueObject for Money {}

impl Money {
    pub fn new(amount: i64, currency: Currency) -> Self {
        Self { amount, currency }
    }

    pub fn vnd(amount: i64) -> Self {
        Self::new(amount, Currency::VND)
    }

    pub fn is_zero(&self) -> bool {
        self.amount == 0
    }

    pub fn is_positive(&self) -> bool {
        self.amount > 0
    }

    fn ensure_same_currency(&self, other: &Money) -> DomainResult<()> {
        if self.currency != other.currency {
            return Err(DomainError::validation(format!(
                "currency mismatch: {} vs {}",
                self.currency, other.currency
            )));
        }
        Ok(())
    }

    /// Checked addition; fails on currency mismatch or overflow.
    pub fn add(&self, other: &Money) -> DomainResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_add(other.amount)
            .ok_or_else(|| DomainError::validation("amount overflow"))?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// Checked subtraction; fails on currency mismatch or overflow.
    pub fn sub(&self, other: &Money) -> DomainResult<Money> {
        self.ensure_same_currency(other)?;
        let amount = self
            .amount
            .checked_sub(other.amount)
            .ok_or_else(|| DomainError::validation("amount overflow"))?;
        Ok(Money::new(amount, self.currency.clone()))
    }

    /// This amount as a percentage of `base`. Zero base returns 0% (never
    /// divides by zero).
    pub fn percent_of(&self, base: &Money) -> DomainResult<f64> {
        self.ensure_same_currency(base)?;
        if base.amount == 0 {
            return Ok(0.0);
        }
        Ok(self.amount as f64 / base.amount as f64 * 100.0)
    }
}

impl core::fmt::Display for Money {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} {}", self.amount, self.currency)
    }
}
