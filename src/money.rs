// src/money.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

pub type AmountValue = i64;

/// A quantity of the server's single in-game currency. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "AmountValue", into = "AmountValue")]
pub struct Amount(AmountValue);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(value: AmountValue) -> Result<Self, MoneyError> {
        if value < 0 {
            return Err(MoneyError::Negative(value));
        }
        Ok(Amount(value))
    }

    pub fn value(&self) -> AmountValue {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `ceil(self * (100 + percent) / 100)`, saturating at `i64::MAX`.
    pub fn raised_by_percent(&self, percent: u32) -> Amount {
        let factor = 100 + i128::from(percent);
        let raised = (i128::from(self.0) * factor + 99) / 100;
        Amount(AmountValue::try_from(raised).unwrap_or(AmountValue::MAX))
    }

    /// Difference that is never negative.
    pub fn saturating_sub(self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0).max(0))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Amount cannot be negative: {0}")]
    Negative(AmountValue),

    #[error("Amount overflow")]
    Overflow,

    #[error("Invalid amount: {0}")]
    Invalid(String),
}

impl TryFrom<AmountValue> for Amount {
    type Error = MoneyError;

    fn try_from(value: AmountValue) -> Result<Self, Self::Error> {
        Amount::new(value)
    }
}

impl From<Amount> for AmountValue {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl Add for Amount {
    type Output = Result<Amount, MoneyError>;

    fn add(self, other: Self) -> Self::Output {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or(MoneyError::Overflow)
    }
}

impl Sub for Amount {
    type Output = Result<Amount, MoneyError>;

    fn sub(self, other: Self) -> Self::Output {
        Amount::new(self.0 - other.0)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = MoneyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = s
            .trim()
            .parse::<AmountValue>()
            .map_err(|_| MoneyError::Invalid(s.to_string()))?;
        Amount::new(value)
    }
}
